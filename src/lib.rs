//! # User API Key
//!
//! A Rust implementation of the client side of the Discourse
//! [User API Key](https://meta.discourse.org/t/user-api-keys-specification/48536)
//! handshake.
//!
//! An application asks a forum for a scoped API key without ever seeing the
//! user's password:
//!
//!  1. [`KeyPairIssuer`](handshake::issuer::KeyPairIssuer) generates a fresh
//!     RSA keypair and nonce.
//!  2. [`AuthorizationRequestBuilder`](handshake::request::AuthorizationRequestBuilder)
//!     turns the public key, scopes and nonce into an authorization URL the
//!     user opens in a browser.
//!  3. [`PayloadDecryptor`](handshake::response::PayloadDecryptor) decrypts
//!     the payload the forum hands back and checks its nonce.
//!
//! [`HandshakeSession`](session::HandshakeSession) drives the three steps
//! against a [`HandshakeStore`](common::store::HandshakeStore) that keeps the
//! key material alive while the user is away.

#![warn(missing_docs)]
#![deny(unreachable_pub)]
#![deny(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod common;
pub mod handshake;
pub mod session;
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use common::{
    config::{ConsumePolicy, HandshakeConfig},
    scope::{PERMITTED_SCOPES, Scope, ScopeSet},
    store::{HandshakeField, HandshakeStore, MemoryHandshakeStore, SessionKey},
};
pub use handshake::{AuthorizationPayload, Handshake, HandshakeResult};
pub use session::{HandshakeRequest, HandshakeSession, HandshakeStatus};

/// Path the forum serves the authorization page on.
pub const AUTHORIZATION_PATH: &str = "/user-api-key/new";

/// Number of random bytes in a handshake nonce.
pub const NONCE_LEN: usize = 32;
