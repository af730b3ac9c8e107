//! Store handshake state across the user's trip to the forum
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, rngs::OsRng};
use std::{collections::HashMap, fmt};
use tokio::sync::Mutex;
use zeroize::Zeroizing;

/// Number of random bytes in a generated session key.
const SESSION_KEY_LEN: usize = 24;

/// Opaque identifier under which one handshake's state is stored.
///
/// Session keys isolate concurrent handshakes from each other. They are
/// unrelated to the caller-supplied client id, which is only a label.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// Generates a fresh random session key.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; SESSION_KEY_LEN] = OsRng.r#gen();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Returns the key as a string, e.g. to put it in a cookie.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionKey")
            .field(&"session key".to_string())
            .finish()
    }
}

/// The fields a handshake keeps in the store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HandshakeField {
    /// PKCS#8 PEM of the handshake's private key
    PrivateKeyPem,
    /// Client id sent to the forum
    ClientId,
    /// Nonce sent to the forum
    Nonce,
}

impl HandshakeField {
    /// Returns the field name used by session-backed stores.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            HandshakeField::PrivateKeyPem => "private_key_pem",
            HandshakeField::ClientId => "client_id",
            HandshakeField::Nonce => "nonce",
        }
    }
}

/// Per-session key-value store for handshake state.
///
/// Implementations must keep values out of reach of the forum (for example a
/// server-side session, never a cookie readable by third parties) and must
/// provide atomic per-key get/put/delete. Expiry of abandoned handshakes is
/// left to the implementation.
///
/// The store requires interior mutability.
#[async_trait]
pub trait HandshakeStore: Send + Sync {
    /// Stores `value` under `field` for the session, replacing any previous
    /// value.
    async fn put(&self, session_key: &SessionKey, field: HandshakeField, value: String);

    /// Returns the value stored under `field` for the session.
    async fn get(&self, session_key: &SessionKey, field: HandshakeField) -> Option<String>;

    /// Removes `field` for the session. Removing an absent field is a no-op.
    async fn delete(&self, session_key: &SessionKey, field: HandshakeField);

    /// Removes `field` for the session and returns the value it held.
    ///
    /// Must be atomic: of two concurrent calls for the same field, at most
    /// one observes the value.
    async fn take(&self, session_key: &SessionKey, field: HandshakeField) -> Option<String>;
}

/// Store that keeps handshake state in process memory.
///
/// Values are zeroized when they are overwritten or deleted.
#[derive(Default)]
pub struct MemoryHandshakeStore {
    values: Mutex<HashMap<(SessionKey, HandshakeField), Zeroizing<String>>>,
}

#[async_trait]
impl HandshakeStore for MemoryHandshakeStore {
    async fn put(&self, session_key: &SessionKey, field: HandshakeField, value: String) {
        let mut values = self.values.lock().await;
        values.insert((session_key.clone(), field), Zeroizing::new(value));
    }

    async fn get(&self, session_key: &SessionKey, field: HandshakeField) -> Option<String> {
        self.values
            .lock()
            .await
            .get(&(session_key.clone(), field))
            .map(|value| value.as_str().to_owned())
    }

    async fn delete(&self, session_key: &SessionKey, field: HandshakeField) {
        self.values
            .lock()
            .await
            .remove(&(session_key.clone(), field));
    }

    async fn take(&self, session_key: &SessionKey, field: HandshakeField) -> Option<String> {
        self.values
            .lock()
            .await
            .remove(&(session_key.clone(), field))
            .map(|value| value.as_str().to_owned())
    }
}

impl fmt::Debug for MemoryHandshakeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHandshakeStore")
            .field("values", &"values".to_string())
            .finish()
    }
}
