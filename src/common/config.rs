//! Handshake configuration

use serde::{Deserialize, Serialize};

use crate::handshake::issuer::DEFAULT_KEY_BITS;

/// When the stored key material of a handshake is discarded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumePolicy {
    /// Discard only after a successful decrypt. A rejected payload can be
    /// corrected and resubmitted against the same handshake.
    #[default]
    OnSuccess,
    /// Discard after the first payload that decodes as base64, whatever the
    /// outcome. Bounds the number of decryption attempts per key to one.
    OnAttempt,
}

/// Settings for [`HandshakeSession`](crate::session::HandshakeSession).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// RSA modulus size in bits.
    pub key_bits: usize,
    /// Key material consumption policy.
    pub consume_policy: ConsumePolicy,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            consume_policy: ConsumePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: HandshakeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, HandshakeConfig::default());
        assert_eq!(config.key_bits, 4096);
        assert_eq!(config.consume_policy, ConsumePolicy::OnSuccess);
    }

    #[test]
    fn policy_uses_snake_case() {
        let config: HandshakeConfig =
            serde_json::from_str(r#"{"consume_policy":"on_attempt","key_bits":3072}"#).unwrap();
        assert_eq!(config.consume_policy, ConsumePolicy::OnAttempt);
        assert_eq!(config.key_bits, 3072);
    }
}
