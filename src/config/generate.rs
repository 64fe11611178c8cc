//! Matching server/client config generation.

use std::path::{Path, PathBuf};

use crate::addr::resolve_address;
use crate::config::{
    ClientConfig, NamedClientConfig, NamedServerConfig, PersistentClientConfig,
    PersistentServerConfig, ServerConfig, TRANSPORT_NAME,
};
use crate::crypto::generate_key_pair;
use crate::error::Result;

/// File name of the generated server config.
pub const SERVER_CONFIG_FILE: &str = "StarbridgeServerConfig.json";

/// File name of the generated client config.
pub const CLIENT_CONFIG_FILE: &str = "StarbridgeClientConfig.json";

/// Config schema version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConfigVariant {
    /// base64 keys, explicit transport name
    #[default]
    Named,
    /// 64-hex-character keys
    Persistent,
}

/// Generate a fresh key pair and wrap it in matching configs for `address`.
///
/// The address is checked up front so a typo never ends up in a config file.
pub fn generate_config_pair(
    address: &str,
    variant: ConfigVariant,
) -> Result<(ServerConfig, ClientConfig)> {
    resolve_address(address)?;
    let keys = generate_key_pair()?;

    let pair = match variant {
        ConfigVariant::Named => (
            ServerConfig::Named(NamedServerConfig {
                server_address: address.to_string(),
                server_private_key: keys.private().to_base64(),
                transport: TRANSPORT_NAME.to_string(),
            }),
            ClientConfig::Named(NamedClientConfig {
                server_address: address.to_string(),
                server_public_key: keys.public().to_base64(),
                transport: TRANSPORT_NAME.to_string(),
            }),
        ),
        ConfigVariant::Persistent => (
            ServerConfig::Persistent(PersistentServerConfig {
                server_persistent_private_key: keys.private().to_hex(),
            }),
            ClientConfig::Persistent(PersistentClientConfig {
                server_address: address.to_string(),
                server_persistent_public_key: keys.public().to_hex(),
            }),
        ),
    };

    Ok(pair)
}

/// Generate a config pair and write it into `dir`.
///
/// Returns the server and client file paths, in that order.
pub fn write_config_files(
    address: &str,
    variant: ConfigVariant,
    dir: &Path,
) -> Result<(PathBuf, PathBuf)> {
    let (server, client) = generate_config_pair(address, variant)?;

    let server_path = dir.join(SERVER_CONFIG_FILE);
    let client_path = dir.join(CLIENT_CONFIG_FILE);

    std::fs::write(&server_path, server.to_json()?)?;
    std::fs::write(&client_path, client.to_json()?)?;

    tracing::info!(
        server = %server_path.display(),
        client = %client_path.display(),
        ?variant,
        "wrote config pair"
    );

    Ok((server_path, client_path))
}

/// Generate a config pair in the current working directory.
pub fn generate_config_files(address: &str, variant: ConfigVariant) -> Result<(PathBuf, PathBuf)> {
    write_config_files(address, variant, Path::new("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{translate, Role};
    use crate::error::Error;

    #[test]
    fn test_generate_rejects_bad_address() {
        let err = generate_config_pair("example.com:443", ConfigVariant::Named).unwrap_err();
        assert!(matches!(err, Error::Address(_)));
    }

    #[test]
    fn test_generated_persistent_keys_are_64_hex() {
        let (server, client) =
            generate_config_pair("10.0.0.1:443", ConfigVariant::Persistent).unwrap();

        let ServerConfig::Persistent(server) = server else {
            panic!("expected persistent server config");
        };
        let ClientConfig::Persistent(client) = client else {
            panic!("expected persistent client config");
        };
        assert_eq!(server.server_persistent_private_key.len(), 64);
        assert_eq!(client.server_persistent_public_key.len(), 64);
    }

    #[test]
    fn test_write_config_files() {
        let dir = tempfile::tempdir().unwrap();
        let (server_path, client_path) =
            write_config_files("127.0.0.1:1234", ConfigVariant::Named, dir.path()).unwrap();

        assert_eq!(server_path.file_name().unwrap(), SERVER_CONFIG_FILE);
        assert_eq!(client_path.file_name().unwrap(), CLIENT_CONFIG_FILE);

        let server = ServerConfig::from_json(&std::fs::read_to_string(&server_path).unwrap()).unwrap();
        let client = ClientConfig::from_json(&std::fs::read_to_string(&client_path).unwrap()).unwrap();

        let server_cfg = translate((&server).into(), Role::Server, None).unwrap();
        let client_cfg = translate((&client).into(), Role::Client, None).unwrap();
        assert_eq!(server_cfg.server_public_key(), client_cfg.server_public_key());
    }
}
