//! Types shared by every stage of the handshake

pub mod config;
pub mod errors;
pub mod scope;
pub mod store;
