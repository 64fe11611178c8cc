//! ptbridge Client Binary
//!
//! Usage: ptbridge-client [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>  Interactive echo session
//!   -t, --test <FILE>    Send one message and print the echo
//!   -h, --help           Print help information

use std::env;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use ptbridge::{dial, ClientConfig, SealedEngine, TcpConnector};

const TEST_MESSAGE: &[u8] = b"Hello, ptbridge!";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing, respects RUST_LOG
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
        "-t" | "--test" => {
            if args.len() < 3 {
                eprintln!("Error: --test requires a config file path");
                return Ok(());
            }
            test_connection(&args[2]).await?;
        }
        "-c" | "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                return Ok(());
            }
            run_client(&args[2]).await?;
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
        r#"ptbridge Client - pluggable transport dialer

USAGE:
    ptbridge-client [OPTIONS]

OPTIONS:
    -c, --config <FILE>  Interactive echo session using config file
    -t, --test <FILE>    Test connection using config file
    -h, --help           Print help information

CONFIGURATION FILE FORMAT (JSON), either:
    {{
        "serverAddress": "203.0.113.7:443",
        "serverPublicKey": "<base64>",
        "transport": "starbridge"
    }}
or:
    {{
        "serverAddress": "203.0.113.7:443",
        "serverPersistentPublicKey": "<64 hex>"
    }}

EXAMPLES:
    Test connection:
        ptbridge-client --test StarbridgeClientConfig.json
"#
    );
}

fn load_config(path: &str) -> anyhow::Result<ClientConfig> {
    let content = std::fs::read_to_string(path)?;
    Ok(ClientConfig::from_json(&content)?)
}

async fn test_connection(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    tracing::info!("Testing connection to {}", config.address());

    match dial(&config, &TcpConnector, &SealedEngine::new()).await {
        Ok(mut conn) => {
            tracing::info!("Connection established successfully!");

            conn.write_all(TEST_MESSAGE).await?;
            conn.flush().await?;
            tracing::info!("Sent test message");

            let mut echo = vec![0u8; TEST_MESSAGE.len()];
            match tokio::time::timeout(Duration::from_secs(5), conn.read_exact(&mut echo)).await {
                Ok(Ok(_)) if echo == TEST_MESSAGE => {
                    tracing::info!("Received echo: {}", String::from_utf8_lossy(&echo));
                }
                Ok(Ok(_)) => {
                    tracing::warn!("Echo did not match message");
                }
                Ok(Err(e)) => {
                    tracing::warn!("Receive error: {}", e);
                }
                Err(_) => {
                    tracing::info!("No response within timeout");
                }
            }

            conn.shutdown().await?;
            tracing::info!("Connection closed successfully");
        }
        Err(e) => {
            tracing::error!("Connection failed: {}", e);
        }
    }

    Ok(())
}

async fn run_client(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    tracing::info!("Connecting to {}", config.address());

    let mut conn = dial(&config, &TcpConnector, &SealedEngine::new()).await?;

    tracing::info!("Connected. Type messages to send, Ctrl+C to exit.");

    let mut input = String::new();
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        input.clear();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let msg = input.trim();
        if msg.is_empty() {
            continue;
        }

        conn.write_all(msg.as_bytes()).await?;
        conn.flush().await?;

        match tokio::time::timeout(Duration::from_secs(5), conn.read(&mut buf)).await {
            Ok(Ok(0)) => {
                eprintln!("Server closed the connection");
                break;
            }
            Ok(Ok(n)) => match std::str::from_utf8(&buf[..n]) {
                Ok(text) => println!("< {}", text),
                Err(_) => println!("< [binary data]"),
            },
            Ok(Err(e)) => {
                eprintln!("Error: {}", e);
                break;
            }
            Err(_) => {}
        }
    }

    conn.shutdown().await?;
    Ok(())
}
