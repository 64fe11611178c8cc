//! The `Persistent` schema: fixed-length hex keys, no transport name.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::RawParts;
use crate::error::ConfigError;

/// Hex characters in a persistent key (32 bytes).
pub const PERSISTENT_KEY_HEX_LEN: usize = 64;

/// `{"serverPersistentPrivateKey"}`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PersistentServerConfig {
    /// 64-hex-character P-256 private scalar
    pub server_persistent_private_key: String,
}

impl PersistentServerConfig {
    pub(crate) fn raw_parts(&self) -> Result<RawParts<'_>, ConfigError> {
        Ok(RawParts {
            address: None,
            key: decode_key(&self.server_persistent_private_key)?,
        })
    }
}

impl fmt::Debug for PersistentServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentServerConfig").finish_non_exhaustive()
    }
}

/// `{"serverAddress", "serverPersistentPublicKey"}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PersistentClientConfig {
    /// Server address to dial, `ip:port`
    pub server_address: String,
    /// 64-hex-character compact P-256 public key
    pub server_persistent_public_key: String,
}

impl PersistentClientConfig {
    pub(crate) fn raw_parts(&self) -> Result<RawParts<'_>, ConfigError> {
        Ok(RawParts {
            address: Some(&self.server_address),
            key: decode_key(&self.server_persistent_public_key)?,
        })
    }
}

fn decode_key(encoded: &str) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    if encoded.len() != PERSISTENT_KEY_HEX_LEN {
        return Err(ConfigError::InvalidKeyLength {
            expected: PERSISTENT_KEY_HEX_LEN,
            actual: encoded.len(),
        });
    }

    hex::decode(encoded)
        .map(Zeroizing::new)
        .map_err(|e| ConfigError::InvalidKeyEncoding(format!("invalid hex key: {}", e)))
}
