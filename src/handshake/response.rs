//! Decrypts and validates the payload the forum hands back.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::rngs::OsRng;
use rsa::Pkcs1v15Encrypt;
use zeroize::Zeroizing;

use crate::common::errors::DecryptPayloadError;

use super::{AuthorizationPayload, Handshake, HandshakeResult};

/// Redeems the encrypted payload of a handshake.
#[derive(Debug, Default, Clone, Copy)]
pub struct PayloadDecryptor;

impl PayloadDecryptor {
    /// Creates a new decryptor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decrypts `ciphertext_b64` with the handshake's private key and checks
    /// the nonce it carries.
    ///
    /// The forum line-wraps its base64 output, so ASCII whitespace is
    /// ignored. An empty submission counts as an encoding error.
    ///
    /// # Errors
    /// Returns an error if the input is not base64, cannot be decrypted with
    /// PKCS#1 v1.5, is not a well-formed payload, or carries a different
    /// nonce.
    pub fn decrypt(
        &self,
        ciphertext_b64: &str,
        handshake: &Handshake,
    ) -> Result<HandshakeResult, DecryptPayloadError> {
        let compact: String = ciphertext_b64
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        if compact.is_empty() {
            return Err(DecryptPayloadError::Encoding);
        }
        let ciphertext = STANDARD
            .decode(compact)
            .map_err(|_| DecryptPayloadError::Encoding)?;

        let plaintext = Zeroizing::new(
            handshake
                .private_key
                .decrypt_blinded(&mut OsRng, Pkcs1v15Encrypt, &ciphertext)
                .map_err(|_| DecryptPayloadError::Decryption)?,
        );

        let payload: AuthorizationPayload =
            serde_json::from_slice(&plaintext).map_err(DecryptPayloadError::MalformedPayload)?;

        // Exact, case-sensitive match. The payload is untrusted until here.
        if payload.nonce != handshake.nonce {
            return Err(DecryptPayloadError::NonceMismatch);
        }

        Ok(HandshakeResult {
            client_id: handshake.client_id.clone(),
            payload,
        })
    }
}
