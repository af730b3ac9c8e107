use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use user_api_key::{
    ConsumePolicy, HandshakeConfig, HandshakeField, HandshakeRequest, HandshakeSession,
    HandshakeStatus, HandshakeStore, MemoryHandshakeStore, SessionKey,
    common::errors::{
        BeginHandshakeError, BuildRequestError, CompleteHandshakeError, DecryptPayloadError,
        IssueHandshakeError,
    },
    test_utils::{
        forum::{AuthorizationParams, Forum, seal_bytes},
        test_issuer,
    },
};

fn new_session<S: HandshakeStore>(
    store: &S,
    session_key: SessionKey,
    consume_policy: ConsumePolicy,
) -> HandshakeSession<'_, S> {
    let config = HandshakeConfig {
        consume_policy,
        ..HandshakeConfig::default()
    };
    HandshakeSession::with_config(store, session_key, config).with_issuer(test_issuer())
}

/// Memory store that yields to the scheduler on every access, so concurrent
/// calls interleave between store operations.
#[derive(Debug, Default)]
struct YieldingStore(MemoryHandshakeStore);

#[async_trait]
impl HandshakeStore for YieldingStore {
    async fn put(&self, session_key: &SessionKey, field: HandshakeField, value: String) {
        tokio::task::yield_now().await;
        self.0.put(session_key, field, value).await;
    }

    async fn get(&self, session_key: &SessionKey, field: HandshakeField) -> Option<String> {
        tokio::task::yield_now().await;
        self.0.get(session_key, field).await
    }

    async fn delete(&self, session_key: &SessionKey, field: HandshakeField) {
        tokio::task::yield_now().await;
        self.0.delete(session_key, field).await;
    }

    async fn take(&self, session_key: &SessionKey, field: HandshakeField) -> Option<String> {
        tokio::task::yield_now().await;
        self.0.take(session_key, field).await
    }
}

fn request() -> HandshakeRequest {
    HandshakeRequest::new("https://example.forum", "Sample Discourse App")
        .with_client_id("abc123")
        .with_scopes(["read", "notifications"])
}

/// Flips one bit in the middle of a base64 ciphertext.
fn tamper(encrypted: &str) -> String {
    let compact: String = encrypted.split_whitespace().collect();
    let mut ciphertext = STANDARD.decode(compact).unwrap();
    let middle = ciphertext.len() / 2;
    ciphertext[middle] ^= 0x01;
    STANDARD.encode(ciphertext)
}

#[tokio::test]
async fn handshake_cycle() {
    // Application: in-memory session store and a session for this user
    let store = MemoryHandshakeStore::default();
    let session_key = SessionKey::generate();
    let session = new_session(&store, session_key.clone(), ConsumePolicy::OnSuccess);
    assert_eq!(session.status().await, HandshakeStatus::Idle);

    // Application: issue the handshake and build the authorization URL
    let url = session.begin(&request()).await.unwrap();
    assert_eq!(session.status().await, HandshakeStatus::AwaitingPayload);

    // Forum: the user approves the request, the payload is line-wrapped base64
    let approval = Forum::new().approve(url.as_str()).unwrap();
    assert!(approval.encrypted.contains('\n'));

    // Application: redeem the payload the user pasted back
    let result = session.complete(&approval.encrypted).await.unwrap();

    assert_eq!(result.client_id(), "abc123");
    assert_eq!(result.payload(), &approval.payload);
    assert_eq!(result.key(), approval.payload.key);
    assert!(!format!("{result:?}").contains(&approval.payload.key));

    // Key material is gone, the client id stays for display
    assert_eq!(
        store
            .get(&session_key, HandshakeField::PrivateKeyPem)
            .await,
        None
    );
    assert_eq!(store.get(&session_key, HandshakeField::Nonce).await, None);
    assert_eq!(
        store
            .get(&session_key, HandshakeField::ClientId)
            .await
            .as_deref(),
        Some("abc123")
    );
    assert_eq!(session.status().await, HandshakeStatus::Idle);

    // A replayed payload finds no handshake
    assert!(matches!(
        session.complete(&approval.encrypted).await,
        Err(CompleteHandshakeError::HandshakeNotFound)
    ));
}

#[tokio::test]
async fn nonce_mismatch_is_rejected() {
    let store = MemoryHandshakeStore::default();
    let session = new_session(&store, SessionKey::generate(), ConsumePolicy::OnSuccess);
    let url = session.begin(&request()).await.unwrap();
    let params = AuthorizationParams::from_url(url.as_str()).unwrap();

    // Forum: a well-formed payload carrying someone else's nonce
    let json = r#"{"key":"0123456789abcdef","nonce":"replayed-nonce","push":false,"api":4}"#;
    let encrypted = seal_bytes(&params.public_key, json.as_bytes()).unwrap();

    let err = session.complete(&encrypted).await.unwrap_err();
    assert!(matches!(
        err,
        CompleteHandshakeError::Payload(DecryptPayloadError::NonceMismatch)
    ));
    assert_eq!(
        err.to_string(),
        "Nonce does not match - security verification failed"
    );
    assert!(!err.to_string().contains(&params.nonce));

    // Reference behavior: the handshake stays redeemable
    assert_eq!(session.status().await, HandshakeStatus::AwaitingPayload);
}

#[tokio::test]
async fn tampered_ciphertext_is_rejected() {
    let store = MemoryHandshakeStore::default();
    let session = new_session(&store, SessionKey::generate(), ConsumePolicy::OnSuccess);
    let url = session.begin(&request()).await.unwrap();
    let approval = Forum::new().approve(url.as_str()).unwrap();

    assert!(matches!(
        session.complete(&tamper(&approval.encrypted)).await,
        Err(CompleteHandshakeError::Payload(
            DecryptPayloadError::Decryption
        ))
    ));

    // The genuine payload still works afterwards
    let result = session.complete(&approval.encrypted).await.unwrap();
    assert_eq!(result.key(), approval.payload.key);
}

#[tokio::test]
async fn encoding_error_keeps_state_under_either_policy() {
    for policy in [ConsumePolicy::OnSuccess, ConsumePolicy::OnAttempt] {
        let store = MemoryHandshakeStore::default();
        let session = new_session(&store, SessionKey::generate(), policy);
        let url = session.begin(&request()).await.unwrap();

        assert!(matches!(
            session.complete("%%% not base64 %%%").await,
            Err(CompleteHandshakeError::Payload(DecryptPayloadError::Encoding))
        ));
        assert_eq!(session.status().await, HandshakeStatus::AwaitingPayload);

        // Resubmitting a corrected payload succeeds
        let approval = Forum::new().approve(url.as_str()).unwrap();
        assert!(session.complete(&approval.encrypted).await.is_ok());
    }
}

#[tokio::test]
async fn single_attempt_policy_consumes_on_failure() {
    let store = MemoryHandshakeStore::default();
    let session = new_session(&store, SessionKey::generate(), ConsumePolicy::OnAttempt);
    let url = session.begin(&request()).await.unwrap();
    let approval = Forum::new().approve(url.as_str()).unwrap();

    assert!(matches!(
        session.complete(&tamper(&approval.encrypted)).await,
        Err(CompleteHandshakeError::Payload(
            DecryptPayloadError::Decryption
        ))
    ));
    assert_eq!(session.status().await, HandshakeStatus::Idle);

    assert!(matches!(
        session.complete(&approval.encrypted).await,
        Err(CompleteHandshakeError::HandshakeNotFound)
    ));
}

#[tokio::test]
async fn empty_submission_keeps_state() {
    let store = MemoryHandshakeStore::default();
    let session = new_session(&store, SessionKey::generate(), ConsumePolicy::OnAttempt);
    let url = session.begin(&request()).await.unwrap();

    // Application: the user submitted the form without pasting anything
    for blank in ["", "  \n "] {
        assert!(matches!(
            session.complete(blank).await,
            Err(CompleteHandshakeError::Payload(DecryptPayloadError::Encoding))
        ));
        assert_eq!(session.status().await, HandshakeStatus::AwaitingPayload);
    }

    let approval = Forum::new().approve(url.as_str()).unwrap();
    assert!(session.complete(&approval.encrypted).await.is_ok());
}

#[tokio::test]
async fn payload_is_redeemed_once_under_concurrency() {
    let store = YieldingStore::default();
    let session = new_session(&store, SessionKey::generate(), ConsumePolicy::OnSuccess);
    let url = session.begin(&request()).await.unwrap();
    let approval = Forum::new().approve(url.as_str()).unwrap();

    // Application: the same payload arrives twice at the same time
    let (first, second) = tokio::join!(
        session.complete(&approval.encrypted),
        session.complete(&approval.encrypted)
    );
    let outcomes = [first, second];

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|outcome| matches!(outcome, Err(CompleteHandshakeError::HandshakeNotFound)))
    );
    assert_eq!(session.status().await, HandshakeStatus::Idle);
}

#[tokio::test]
async fn concurrent_handshakes_are_isolated() {
    let store = MemoryHandshakeStore::default();
    let alice = new_session(&store, SessionKey::from("alice"), ConsumePolicy::OnSuccess);
    let bob = new_session(&store, SessionKey::from("bob"), ConsumePolicy::OnSuccess);

    let (alice_request, bob_request) = (request(), request());
    let (alice_url, bob_url) = tokio::join!(alice.begin(&alice_request), bob.begin(&bob_request));
    let (alice_url, bob_url) = (alice_url.unwrap(), bob_url.unwrap());
    let alice_params = AuthorizationParams::from_url(alice_url.as_str()).unwrap();
    let bob_params = AuthorizationParams::from_url(bob_url.as_str()).unwrap();

    assert_ne!(alice_params.nonce, bob_params.nonce);
    assert_ne!(alice_params.public_key, bob_params.public_key);

    // Alice's payload cannot be redeemed with Bob's key
    let alice_approval = Forum::new().approve(alice_url.as_str()).unwrap();
    assert!(matches!(
        bob.complete(&alice_approval.encrypted).await,
        Err(CompleteHandshakeError::Payload(
            DecryptPayloadError::Decryption
        ))
    ));

    let result = alice.complete(&alice_approval.encrypted).await.unwrap();
    assert_eq!(result.key(), alice_approval.payload.key);
    assert_eq!(bob.status().await, HandshakeStatus::AwaitingPayload);
}

#[tokio::test]
async fn complete_without_begin() {
    let store = MemoryHandshakeStore::default();
    let session = new_session(&store, SessionKey::generate(), ConsumePolicy::OnSuccess);

    assert!(matches!(
        session.complete("AAAA").await,
        Err(CompleteHandshakeError::HandshakeNotFound)
    ));
}

#[tokio::test]
async fn corrupted_store_is_reported() {
    let store = MemoryHandshakeStore::default();
    let session_key = SessionKey::generate();
    store
        .put(
            &session_key,
            HandshakeField::PrivateKeyPem,
            "garbage".to_string(),
        )
        .await;
    store
        .put(&session_key, HandshakeField::ClientId, "abc123".to_string())
        .await;
    store
        .put(&session_key, HandshakeField::Nonce, "nonce".to_string())
        .await;

    let session = HandshakeSession::new(&store, session_key);
    assert!(matches!(
        session.complete("AAAA").await,
        Err(CompleteHandshakeError::CorruptedState)
    ));
}

#[tokio::test]
async fn invalid_request_leaves_store_untouched() {
    let store = MemoryHandshakeStore::default();
    let session_key = SessionKey::generate();
    let session = new_session(&store, session_key.clone(), ConsumePolicy::OnSuccess);

    let bad_scope = request().with_scopes(["read", "sudo"]);
    assert_eq!(
        session.begin(&bad_scope).await.unwrap_err(),
        BeginHandshakeError::Build(BuildRequestError::InvalidScope("sudo".to_string()))
    );

    let bad_site = HandshakeRequest::new("not a url", "app");
    assert_eq!(
        session.begin(&bad_site).await.unwrap_err(),
        BeginHandshakeError::Build(BuildRequestError::InvalidBaseUrl)
    );

    for field in [
        HandshakeField::PrivateKeyPem,
        HandshakeField::ClientId,
        HandshakeField::Nonce,
    ] {
        assert_eq!(store.get(&session_key, field).await, None);
    }
}

#[tokio::test]
async fn configured_key_size_below_floor_is_rejected() {
    let store = MemoryHandshakeStore::default();
    let session_key = SessionKey::generate();
    let config = HandshakeConfig {
        key_bits: 2048,
        ..HandshakeConfig::default()
    };
    let session = HandshakeSession::with_config(&store, session_key.clone(), config);

    assert_eq!(
        session.begin(&request()).await.unwrap_err(),
        BeginHandshakeError::Issue(IssueHandshakeError::WeakKeySize {
            bits: 2048,
            min: 3072
        })
    );
    assert_eq!(session.status().await, HandshakeStatus::Idle);
    assert!(!format!("{session:?}").contains(session_key.as_str()));
}
