//! A stand-in for the forum's side of the handshake.
//!
//! [`Forum::approve`] reads an authorization URL the way the forum does,
//! issues a random API key and encrypts the payload with the application's
//! public key using PKCS#1 v1.5, base64-encoded with 60-column lines.
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::{Rng, rngs::OsRng};
use rsa::{Pkcs1v15Encrypt, RsaPublicKey, pkcs8::DecodePublicKey};
use url::Url;

use crate::{AUTHORIZATION_PATH, handshake::AuthorizationPayload};

/// API version the simulated forum reports.
pub const FORUM_API_VERSION: i64 = 4;

/// Line width of the forum's base64 output.
const BASE64_LINE_WIDTH: usize = 60;

/// Parameters of an authorization request, as the forum decodes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationParams {
    /// `application_name` parameter
    pub application_name: String,
    /// `client_id` parameter
    pub client_id: String,
    /// `scopes` parameter, still comma-joined
    pub scopes: String,
    /// `public_key` parameter
    pub public_key: String,
    /// `nonce` parameter
    pub nonce: String,
    /// `auth_redirect` parameter
    pub auth_redirect: Option<String>,
    /// `push_url` parameter
    pub push_url: Option<String>,
}

impl AuthorizationParams {
    /// Decodes the query of an authorization URL. Returns `None` if the URL
    /// does not point at the authorization page or a required parameter is
    /// missing.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let url = Url::parse(url).ok()?;
        if !url.path().ends_with(AUTHORIZATION_PATH) {
            return None;
        }
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };
        Some(Self {
            application_name: param("application_name")?,
            client_id: param("client_id")?,
            scopes: param("scopes")?,
            public_key: param("public_key")?,
            nonce: param("nonce")?,
            auth_redirect: param("auth_redirect"),
            push_url: param("push_url"),
        })
    }
}

/// The result of the user approving a request on the forum.
#[derive(Debug, Clone)]
pub struct Approval {
    /// The plaintext payload the forum encrypted.
    pub payload: AuthorizationPayload,
    /// The encrypted payload as shown to the user.
    pub encrypted: String,
}

/// Simulated forum.
#[derive(Debug, Default, Clone, Copy)]
pub struct Forum;

impl Forum {
    /// Creates a new forum.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Approves the authorization request in `url`.
    ///
    /// Returns `None` if the URL is not a valid authorization request.
    #[must_use]
    pub fn approve(&self, url: &str) -> Option<Approval> {
        let params = AuthorizationParams::from_url(url)?;
        let key_bytes: [u8; 16] = OsRng.r#gen();
        let payload = AuthorizationPayload {
            key: key_bytes.iter().map(|b| format!("{b:02x}")).collect(),
            nonce: params.nonce,
            push: params.scopes.split(',').any(|scope| scope == "push"),
            api: FORUM_API_VERSION,
        };
        let encrypted = seal_payload(&params.public_key, &payload)?;
        Some(Approval { payload, encrypted })
    }
}

/// Encrypts `payload` for `public_key_pem` the way the forum does.
#[must_use]
pub fn seal_payload(public_key_pem: &str, payload: &AuthorizationPayload) -> Option<String> {
    let json = serde_json::to_vec(payload).ok()?;
    seal_bytes(public_key_pem, &json)
}

/// Encrypts arbitrary bytes for `public_key_pem` and base64-encodes them with
/// the forum's line wrapping.
#[must_use]
pub fn seal_bytes(public_key_pem: &str, plaintext: &[u8]) -> Option<String> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem).ok()?;
    let ciphertext = public_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
        .ok()?;
    Some(wrap_lines(&STANDARD.encode(ciphertext)))
}

fn wrap_lines(encoded: &str) -> String {
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_WIDTH + 1);
    for line in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
        wrapped.push_str(&String::from_utf8_lossy(line));
        wrapped.push('\n');
    }
    wrapped
}
