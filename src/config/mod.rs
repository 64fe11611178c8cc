//! Transport configuration and translation into engine configuration.
//!
//! Two incompatible JSON schemas exist in the wild:
//!
//! | Variant      | Key encoding        | Transport field       | Server address        |
//! |--------------|---------------------|-----------------------|-----------------------|
//! | `Named`      | base64              | must be `"starbridge"`| in the config         |
//! | `Persistent` | 64 hex characters   | absent                | supplied at listen    |
//!
//! Both are modelled as untagged enums per role ([`ServerConfig`],
//! [`ClientConfig`]); serde picks the variant from the fields present.
//! [`translate`] is the single entry point that turns either into a
//! [`SecureChannelConfig`]. It performs no I/O, so every key or address
//! problem is reported before a socket exists.

mod generate;
mod named;
mod persistent;

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::addr::resolve_address;
use crate::crypto::{validate_private_key, PrivateKey, PublicKey};
use crate::error::{ConfigError, KeyError};

pub use generate::{
    generate_config_files, generate_config_pair, write_config_files, ConfigVariant,
    CLIENT_CONFIG_FILE, SERVER_CONFIG_FILE,
};
pub use named::{NamedClientConfig, NamedServerConfig};
pub use persistent::{PersistentClientConfig, PersistentServerConfig};

/// Transport name a `Named` config must carry.
pub const TRANSPORT_NAME: &str = "starbridge";

/// Handshake mode tag for the connecting side.
pub const CLIENT_MODE_TAG: &str = "SMTPClient";

/// Handshake mode tag for the accepting side.
pub const SERVER_MODE_TAG: &str = "SMTPServer";

/// Which end of the channel a config describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Dials out and authenticates the server's public key
    Client,
    /// Accepts and proves possession of the private key
    Server,
}

impl Role {
    /// Lowercase role name for logs and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }

    /// The handshake mode this role runs.
    pub fn mode(self) -> HandshakeMode {
        match self {
            Role::Client => HandshakeMode::Client,
            Role::Server => HandshakeMode::Server,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handshake-mode tag handed to the engine so each side picks matching behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandshakeMode {
    /// [`CLIENT_MODE_TAG`]
    Client,
    /// [`SERVER_MODE_TAG`]
    Server,
}

impl HandshakeMode {
    /// The fixed tag string.
    pub fn tag(self) -> &'static str {
        match self {
            HandshakeMode::Client => CLIENT_MODE_TAG,
            HandshakeMode::Server => SERVER_MODE_TAG,
        }
    }
}

/// Validated key material carried into the engine.
#[derive(Clone, Debug)]
pub enum ChannelKey {
    /// Client side: the server's identity key
    ServerPublic(PublicKey),
    /// Server side: its own identity key
    ServerPrivate(PrivateKey),
}

/// Engine configuration for a single connection attempt.
///
/// Only produced by [`translate`], so the key is always valid for its role
/// and the address is always a literal IP endpoint.
#[derive(Clone, Debug)]
pub struct SecureChannelConfig {
    role: Role,
    mode: HandshakeMode,
    address: SocketAddr,
    key: ChannelKey,
}

impl SecureChannelConfig {
    /// Which side of the channel this is.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The handshake mode for this side.
    pub fn mode(&self) -> HandshakeMode {
        self.mode
    }

    /// The resolved server endpoint.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// The validated key.
    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    /// The server's public key as seen by either side.
    pub fn server_public_key(&self) -> PublicKey {
        match &self.key {
            ChannelKey::ServerPublic(public) => public.clone(),
            ChannelKey::ServerPrivate(private) => private.public_key(),
        }
    }
}

/// Server-side configuration in either schema.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerConfig {
    /// base64 key plus explicit transport name
    Named(NamedServerConfig),
    /// 64-hex-character key, address supplied at listen time
    Persistent(PersistentServerConfig),
}

impl ServerConfig {
    /// Parse either schema from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialise back to the schema it came from.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The address stored in the config, if the schema has one.
    pub fn address(&self) -> Option<&str> {
        match self {
            ServerConfig::Named(config) => Some(&config.server_address),
            ServerConfig::Persistent(_) => None,
        }
    }

    /// Which schema this is.
    pub fn variant(&self) -> ConfigVariant {
        match self {
            ServerConfig::Named(_) => ConfigVariant::Named,
            ServerConfig::Persistent(_) => ConfigVariant::Persistent,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("variant", &self.variant())
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Client-side configuration in either schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientConfig {
    /// base64 key plus explicit transport name
    Named(NamedClientConfig),
    /// 64-hex-character key
    Persistent(PersistentClientConfig),
}

impl ClientConfig {
    /// Parse either schema from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialise back to the schema it came from.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The server address to dial.
    pub fn address(&self) -> &str {
        match self {
            ClientConfig::Named(config) => &config.server_address,
            ClientConfig::Persistent(config) => &config.server_address,
        }
    }

    /// Which schema this is.
    pub fn variant(&self) -> ConfigVariant {
        match self {
            ClientConfig::Named(_) => ConfigVariant::Named,
            ClientConfig::Persistent(_) => ConfigVariant::Persistent,
        }
    }
}

/// A borrowed config of either role, as accepted by [`translate`].
#[derive(Clone, Copy, Debug)]
pub enum TransportConfig<'a> {
    /// Listener side
    Server(&'a ServerConfig),
    /// Dialer side
    Client(&'a ClientConfig),
}

impl TransportConfig<'_> {
    /// The role this config was written for.
    pub fn role(&self) -> Role {
        match self {
            TransportConfig::Server(_) => Role::Server,
            TransportConfig::Client(_) => Role::Client,
        }
    }
}

impl<'a> From<&'a ServerConfig> for TransportConfig<'a> {
    fn from(config: &'a ServerConfig) -> Self {
        TransportConfig::Server(config)
    }
}

impl<'a> From<&'a ClientConfig> for TransportConfig<'a> {
    fn from(config: &'a ClientConfig) -> Self {
        TransportConfig::Client(config)
    }
}

/// Decoded but not yet validated fields common to both schemas.
pub(crate) struct RawParts<'a> {
    pub(crate) address: Option<&'a str>,
    pub(crate) key: Zeroizing<Vec<u8>>,
}

/// Translate an external config into the engine's configuration.
///
/// `endpoint`, when given, overrides the address stored in the config (it is
/// the only address source for a `Persistent` server config).
///
/// Steps, each failing fast: role check, schema checks and key decoding,
/// address resolution, key validation.
pub fn translate(
    config: TransportConfig<'_>,
    role: Role,
    endpoint: Option<&str>,
) -> Result<SecureChannelConfig, ConfigError> {
    if config.role() != role {
        return Err(ConfigError::RoleMismatch {
            expected: role.as_str(),
            actual: config.role().as_str(),
        });
    }

    let parts = match config {
        TransportConfig::Server(ServerConfig::Named(c)) => c.raw_parts()?,
        TransportConfig::Server(ServerConfig::Persistent(c)) => c.raw_parts()?,
        TransportConfig::Client(ClientConfig::Named(c)) => c.raw_parts()?,
        TransportConfig::Client(ClientConfig::Persistent(c)) => c.raw_parts()?,
    };

    let address = endpoint.or(parts.address).ok_or(ConfigError::MissingAddress)?;
    let address = resolve_address(address)?;

    let key = match role {
        Role::Client => ChannelKey::ServerPublic(PublicKey::from_bytes(&parts.key)?),
        Role::Server => {
            if !validate_private_key(&parts.key) {
                return Err(ConfigError::InvalidKey(KeyError::validation(
                    "server private key failed trial key agreement",
                )));
            }
            ChannelKey::ServerPrivate(PrivateKey::from_bytes(&parts.key)?)
        }
    };

    tracing::debug!(role = role.as_str(), %address, "translated transport config");

    Ok(SecureChannelConfig {
        role,
        mode: role.mode(),
        address,
        key,
    })
}
