//! Issues the keypair, nonce and client id of a new handshake.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use rsa::RsaPrivateKey;
use uuid::Uuid;

use crate::{NONCE_LEN, common::errors::IssueHandshakeError};

use super::Handshake;

/// Default RSA modulus size in bits.
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Smallest RSA modulus size the issuer accepts.
pub const MIN_KEY_BITS: usize = 3072;

/// Modulus size of test keys. Below [`MIN_KEY_BITS`].
#[cfg(any(test, feature = "test-utils"))]
pub(crate) const TEST_KEY_BITS: usize = 2048;

/// Generates the per-attempt key material of a handshake.
#[derive(Debug, Clone, Copy)]
pub struct KeyPairIssuer {
    key_bits: usize,
}

impl Default for KeyPairIssuer {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

impl KeyPairIssuer {
    /// Creates an issuer that generates [`DEFAULT_KEY_BITS`]-bit keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an issuer with a custom modulus size.
    ///
    /// # Errors
    /// Returns an error if `key_bits` is below [`MIN_KEY_BITS`].
    pub fn with_key_bits(key_bits: usize) -> Result<Self, IssueHandshakeError> {
        if key_bits < MIN_KEY_BITS {
            return Err(IssueHandshakeError::WeakKeySize {
                bits: key_bits,
                min: MIN_KEY_BITS,
            });
        }
        Ok(Self { key_bits })
    }

    /// Creates an issuer without checking the modulus size against
    /// [`MIN_KEY_BITS`].
    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) const fn unchecked(key_bits: usize) -> Self {
        Self { key_bits }
    }

    /// Returns the modulus size in bits.
    #[must_use]
    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    /// Issues a new handshake.
    ///
    /// A non-empty `client_id` is used verbatim, otherwise a random UUID is
    /// generated. Key generation is CPU heavy; async callers should use
    /// [`issue_async`](Self::issue_async).
    ///
    /// # Errors
    /// Returns an error if the OS random source fails or the keypair cannot
    /// be generated.
    pub fn issue(&self, client_id: Option<&str>) -> Result<Handshake, IssueHandshakeError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|_| IssueHandshakeError::KeyGeneration)?;
        let nonce = URL_SAFE_NO_PAD.encode(nonce);

        let private_key = RsaPrivateKey::new(&mut OsRng, self.key_bits)
            .map_err(|_| IssueHandshakeError::KeyGeneration)?;

        let client_id = match client_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let handshake = Handshake::new(client_id, nonce, private_key)
            .ok_or(IssueHandshakeError::KeyGeneration)?;

        tracing::debug!(
            client_id = %handshake.client_id,
            key_id = %handshake.key_id(),
            key_bits = self.key_bits,
            "issued handshake"
        );
        Ok(handshake)
    }

    /// Issues a new handshake on Tokio's blocking thread pool.
    ///
    /// # Errors
    /// See [`issue`](Self::issue).
    pub async fn issue_async(
        &self,
        client_id: Option<String>,
    ) -> Result<Handshake, IssueHandshakeError> {
        let issuer = *self;
        tokio::task::spawn_blocking(move || issuer.issue(client_id.as_deref()))
            .await
            .map_err(|_| IssueHandshakeError::KeyGeneration)?
    }
}
