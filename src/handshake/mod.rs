//! # User API Key handshake
//!
//! One [`Handshake`] is created per attempt by the
//! [`KeyPairIssuer`](issuer::KeyPairIssuer), advertised to the forum through
//! the [`AuthorizationRequestBuilder`](request::AuthorizationRequestBuilder)
//! and redeemed by the [`PayloadDecryptor`](response::PayloadDecryptor).

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::{
    RsaPrivateKey,
    pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

pub mod issuer;
pub mod request;
pub mod response;

/// Key id length in bytes, taken from the front of the SHA-256 digest.
const KEY_ID_LEN: usize = 12;

/// State of one handshake attempt.
///
/// Holds the private key, so it is never serialized as a whole and its
/// `Debug` output hides the key and the nonce.
pub struct Handshake {
    pub(crate) client_id: String,
    pub(crate) nonce: String,
    pub(crate) private_key: RsaPrivateKey,
    pub(crate) public_key_pem: String,
}

impl Handshake {
    pub(crate) fn new(
        client_id: String,
        nonce: String,
        private_key: RsaPrivateKey,
    ) -> Option<Self> {
        let public_key_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .ok()?;
        Some(Self {
            client_id,
            nonce,
            private_key,
            public_key_pem,
        })
    }

    /// Rebuilds a handshake from the fields kept in a store.
    pub(crate) fn restore(
        client_id: String,
        nonce: String,
        private_key_pem: &str,
    ) -> Option<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem).ok()?;
        Self::new(client_id, nonce, private_key)
    }

    /// PKCS#8 PEM of the private key, for the handshake store only.
    pub(crate) fn private_key_pem(&self) -> Option<Zeroizing<String>> {
        self.private_key.to_pkcs8_pem(LineEnding::LF).ok()
    }

    /// Returns the client id sent to the forum.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the nonce the forum has to echo back.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Returns the SubjectPublicKeyInfo PEM sent to the forum.
    #[must_use]
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Returns a short identifier of the public key that is safe to log.
    #[must_use]
    pub fn key_id(&self) -> String {
        public_key_to_key_id(&self.public_key_pem)
    }
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("client_id", &self.client_id)
            .field("nonce", &"nonce".to_string())
            .field("private_key", &"private key".to_string())
            .field("key_id", &self.key_id())
            .finish()
    }
}

/// Converts a public key PEM to a key id.
#[must_use]
pub fn public_key_to_key_id(public_key_pem: &str) -> String {
    let digest = Sha256::digest(public_key_pem.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..KEY_ID_LEN])
}

/// The record the forum encrypts for the application.
///
/// Untrusted until its nonce has been checked against the handshake.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPayload {
    /// The issued API key.
    pub key: String,
    /// Nonce echoed back by the forum.
    pub nonce: String,
    /// Whether push notifications were granted.
    pub push: bool,
    /// API version of the forum.
    pub api: i64,
}

impl fmt::Debug for AuthorizationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationPayload")
            .field("key", &"key".to_string())
            .field("nonce", &"nonce".to_string())
            .field("push", &self.push)
            .field("api", &self.api)
            .finish()
    }
}

/// The outcome of a successful handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeResult {
    pub(crate) client_id: String,
    pub(crate) payload: AuthorizationPayload,
}

impl HandshakeResult {
    /// Returns the client id the key was issued to.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the validated payload.
    #[must_use]
    pub fn payload(&self) -> &AuthorizationPayload {
        &self.payload
    }

    /// Returns the issued API key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.payload.key
    }
}
