//! The `Named` schema: base64 keys and an explicit transport name.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::{RawParts, TRANSPORT_NAME};
use crate::error::ConfigError;

/// `{"serverAddress", "serverPrivateKey", "transport"}`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedServerConfig {
    /// Listen address, `ip:port`
    pub server_address: String,
    /// base64 P-256 private scalar
    pub server_private_key: String,
    /// Must equal [`TRANSPORT_NAME`]
    pub transport: String,
}

impl NamedServerConfig {
    pub(crate) fn raw_parts(&self) -> Result<RawParts<'_>, ConfigError> {
        check_transport(&self.transport)?;
        Ok(RawParts {
            address: Some(&self.server_address),
            key: decode_key(&self.server_private_key)?,
        })
    }
}

impl fmt::Debug for NamedServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedServerConfig")
            .field("server_address", &self.server_address)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

/// `{"serverAddress", "serverPublicKey", "transport"}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedClientConfig {
    /// Server address to dial, `ip:port`
    pub server_address: String,
    /// base64 P-256 public key
    pub server_public_key: String,
    /// Must equal [`TRANSPORT_NAME`]
    pub transport: String,
}

impl NamedClientConfig {
    pub(crate) fn raw_parts(&self) -> Result<RawParts<'_>, ConfigError> {
        check_transport(&self.transport)?;
        Ok(RawParts {
            address: Some(&self.server_address),
            key: decode_key(&self.server_public_key)?,
        })
    }
}

fn check_transport(transport: &str) -> Result<(), ConfigError> {
    if transport != TRANSPORT_NAME {
        return Err(ConfigError::UnsupportedTransport(transport.to_string()));
    }
    Ok(())
}

fn decode_key(encoded: &str) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    STANDARD
        .decode(encoded)
        .map(Zeroizing::new)
        .map_err(|e| ConfigError::InvalidKeyEncoding(format!("invalid base64 key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_must_match_exactly() {
        assert!(check_transport("starbridge").is_ok());
        assert!(check_transport("Starbridge").is_err());
        assert!(check_transport("").is_err());
        assert!(check_transport("starbridge ").is_err());
    }

    #[test]
    fn test_transport_checked_before_key() {
        let config = NamedClientConfig {
            server_address: "127.0.0.1:1".into(),
            server_public_key: "%%%".into(),
            transport: "obfs4".into(),
        };
        assert!(matches!(
            config.raw_parts(),
            Err(ConfigError::UnsupportedTransport(_))
        ));
    }

    #[test]
    fn test_field_names() {
        let config = NamedServerConfig {
            server_address: "127.0.0.1:1234".into(),
            server_private_key: "AQID".into(),
            transport: TRANSPORT_NAME.into(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(
            json,
            r#"{"serverAddress":"127.0.0.1:1234","serverPrivateKey":"AQID","transport":"starbridge"}"#
        );

        let parts = config.raw_parts().unwrap();
        assert_eq!(parts.key.as_slice(), &[1, 2, 3]);
    }
}
