use criterion::{Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use user_api_key::{
    HandshakeRequest, HandshakeSession, MemoryHandshakeStore, SessionKey,
    handshake::{
        issuer::KeyPairIssuer,
        request::AuthorizationRequestBuilder,
        response::PayloadDecryptor,
    },
    test_utils::{forum::Forum, test_issuer},
};

fn criterion_issuer_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("issuer");
    group.sample_size(10);

    for issuer in [test_issuer(), KeyPairIssuer::new()] {
        let key_bits = issuer.key_bits();
        group.bench_function(format!("CLIENT: Issue {key_bits}-bit handshake"), |b| {
            b.iter(|| issuer.issue(None).unwrap());
        });
    }
    group.finish();
}

fn criterion_handshake_benchmark(c: &mut Criterion) {
    let handshake = KeyPairIssuer::new().issue(Some("bench")).unwrap();
    let builder = AuthorizationRequestBuilder::new();

    // Build authorization request
    c.bench_function("CLIENT: Build authorization request", |b| {
        b.iter(|| {
            builder
                .build(
                    "https://example.forum",
                    "Benchmark",
                    &handshake,
                    ["read", "notifications"],
                )
                .unwrap()
        });
    });

    // Decrypt payload
    c.bench_function("CLIENT: Decrypt payload", |b| {
        b.iter_with_setup(
            || {
                let url = builder
                    .build("https://example.forum", "Benchmark", &handshake, ["read"])
                    .unwrap();
                Forum::new().approve(url.as_str()).unwrap()
            },
            |approval| {
                PayloadDecryptor::new()
                    .decrypt(&approval.encrypted, &handshake)
                    .unwrap()
            },
        );
    });
}

fn criterion_session_benchmark(c: &mut Criterion) {
    // Complete a session against the memory store
    c.bench_function("SESSION: Complete handshake", |b| {
        let rt = Runtime::new().unwrap();
        b.iter_with_setup(
            || {
                let store = MemoryHandshakeStore::default();
                let session_key = SessionKey::generate();
                let approval = rt.block_on(async {
                    let session = HandshakeSession::new(&store, session_key.clone())
                        .with_issuer(test_issuer());
                    let url = session
                        .begin(&HandshakeRequest::new("https://example.forum", "Benchmark"))
                        .await
                        .unwrap();
                    Forum::new().approve(url.as_str()).unwrap()
                });
                (store, session_key, approval)
            },
            |(store, session_key, approval)| {
                rt.block_on(async {
                    HandshakeSession::new(&store, session_key)
                        .complete(&approval.encrypted)
                        .await
                        .unwrap()
                })
            },
        );
    });
}

criterion_group!(
    benches,
    criterion_issuer_benchmark,
    criterion_handshake_benchmark,
    criterion_session_benchmark
);
criterion_main!(benches);
