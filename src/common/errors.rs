//! Common error types

use thiserror::Error;

/// Errors that can occur when issuing a new handshake.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IssueHandshakeError {
    #[error("Key generation failed")]
    /// The random source was unavailable or the keypair could not be
    /// generated. The handshake must be abandoned.
    KeyGeneration,
    #[error("Key size of {bits} bits is below the minimum of {min} bits")]
    /// The issuer was configured with a modulus that is too small.
    WeakKeySize {
        /// Requested modulus size.
        bits: usize,
        /// Smallest accepted modulus size.
        min: usize,
    },
}

/// Errors that can occur when building the authorization request.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildRequestError {
    #[error("Invalid scope: {0}")]
    /// A requested scope is not part of the permitted vocabulary.
    InvalidScope(String),
    #[error("Invalid site URL")]
    /// The base URL is not an absolute http(s) URL.
    InvalidBaseUrl,
}

/// Errors that can occur when decrypting the authorization payload.
#[derive(Error, Debug)]
pub enum DecryptPayloadError {
    #[error("Encrypted payload is not valid base64")]
    /// The submitted payload could not be base64-decoded.
    Encoding,
    #[error("Encrypted payload could not be decrypted")]
    /// PKCS#1 v1.5 decryption failed: the ciphertext is corrupted or was not
    /// produced for this handshake's key.
    Decryption,
    #[error("Decrypted payload is malformed")]
    /// The plaintext is not a well-formed authorization payload.
    MalformedPayload(#[source] serde_json::Error),
    #[error("Nonce does not match - security verification failed")]
    /// The payload was not produced for this handshake.
    NonceMismatch,
}

/// Errors that can occur when starting a handshake session.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BeginHandshakeError {
    #[error(transparent)]
    /// Issuing the keypair failed.
    Issue(#[from] IssueHandshakeError),
    #[error(transparent)]
    /// Building the authorization URL failed.
    Build(#[from] BuildRequestError),
}

/// Errors that can occur when completing a handshake session.
#[derive(Error, Debug)]
pub enum CompleteHandshakeError {
    #[error("No pending handshake for this session")]
    /// The store holds no (or only partial) handshake state for the session.
    HandshakeNotFound,
    #[error("Stored handshake state is corrupted")]
    /// The stored private key could not be loaded.
    CorruptedState,
    #[error(transparent)]
    /// The submitted payload was rejected.
    Payload(#[from] DecryptPayloadError),
}
