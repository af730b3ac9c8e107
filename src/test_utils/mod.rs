//! Helpers for testing applications that use this crate.

use crate::handshake::issuer::{KeyPairIssuer, TEST_KEY_BITS};

pub mod forum;

/// Returns an issuer of 2048-bit keys, below the production floor.
///
/// Generating keys of the default size makes test suites slow. Hand this
/// issuer to [`HandshakeSession::with_issuer`](crate::session::HandshakeSession::with_issuer)
/// in tests only.
#[must_use]
pub fn test_issuer() -> KeyPairIssuer {
    KeyPairIssuer::unchecked(TEST_KEY_BITS)
}
