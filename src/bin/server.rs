//! ptbridge Server Binary
//!
//! Usage: ptbridge-server [OPTIONS]
//!
//! Options:
//!   -g, --generate <ADDR>       Write a matching server/client config pair
//!   -c, --config <FILE> [ADDR]  Run an echo listener
//!   -h, --help                  Print help information

use std::env;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use ptbridge::config::{generate_config_files, ConfigVariant};
use ptbridge::error::AcceptError;
use ptbridge::{listen, translate, Role, SealedEngine, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing, respects RUST_LOG (e.g. RUST_LOG=ptbridge=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "-h" | "--help" => {
            print_usage();
        }
        "-g" | "--generate" => {
            if args.len() < 3 {
                eprintln!("Error: --generate requires an address");
                return Ok(());
            }
            let variant = match args.get(3).map(String::as_str) {
                Some("--persistent") => ConfigVariant::Persistent,
                _ => ConfigVariant::Named,
            };
            generate_config(&args[2], variant)?;
        }
        "-c" | "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                return Ok(());
            }
            run_server(&args[2], args.get(3).map(String::as_str)).await?;
        }
        "--show-pubkey" => {
            if args.len() < 3 {
                eprintln!("Error: --show-pubkey requires a config file path");
                return Ok(());
            }
            show_pubkey(&args[2])?;
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"ptbridge Server - pluggable transport listener

USAGE:
    ptbridge-server [OPTIONS]

OPTIONS:
    -g, --generate <ADDR> [--persistent]
                                Write StarbridgeServerConfig.json and
                                StarbridgeClientConfig.json for ADDR
    -c, --config <FILE> [ADDR]  Run an echo listener (ADDR is required for
                                persistent server configs)
    --show-pubkey <FILE>        Show the public key clients need
    -h, --help                  Print help information

EXAMPLES:
    Generate a config pair:
        ptbridge-server --generate 203.0.113.7:443

    Run the server:
        ptbridge-server --config StarbridgeServerConfig.json
"#
    );
}

fn generate_config(address: &str, variant: ConfigVariant) -> anyhow::Result<()> {
    let (server_path, client_path) = generate_config_files(address, variant)?;

    println!("Server config: {}", server_path.display());
    println!("Client config: {}", client_path.display());
    println!();
    println!("Keep the server config private; hand the client config to clients.");

    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<ServerConfig> {
    let content = std::fs::read_to_string(path)?;
    Ok(ServerConfig::from_json(&content)?)
}

fn show_pubkey(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let endpoint = config.address().unwrap_or("0.0.0.0:0").to_string();
    let channel = translate((&config).into(), Role::Server, Some(&endpoint))?;
    let public_key = channel.server_public_key();

    println!("Server Public Key (base64): {}", public_key.to_base64());
    println!("Server Public Key (hex):    {}", public_key.to_hex());

    Ok(())
}

async fn run_server(config_path: &str, address: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let address = match address.or(config.address()) {
        Some(address) => address.to_string(),
        None => anyhow::bail!("persistent server configs need a listen address argument"),
    };

    // Surface key problems at startup; accept would reject every connection.
    translate((&config).into(), Role::Server, Some(&address))?;

    let listener = Arc::new(listen(&address, config, SealedEngine::new()).await?);
    tracing::info!("Echo server ready on {}", listener.local_addr());

    loop {
        match listener.accept().await {
            Ok(mut conn) => {
                tokio::spawn(async move {
                    let peer_addr = conn.peer_addr();
                    let mut buf = vec![0u8; 16 * 1024];
                    loop {
                        match conn.read(&mut buf).await {
                            Ok(0) => break,
                            Ok(n) => {
                                if let Err(e) = conn.write_all(&buf[..n]).await {
                                    tracing::debug!("Write error to {}: {}", peer_addr, e);
                                    break;
                                }
                                if let Err(e) = conn.flush().await {
                                    tracing::debug!("Flush error to {}: {}", peer_addr, e);
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!("Connection error from {}: {}", peer_addr, e);
                                break;
                            }
                        }
                    }
                });
            }
            Err(AcceptError::Closed) => break,
            Err(e) => {
                tracing::warn!("Accept error: {}", e);
                let delay = e.retry_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Ok(())
}
