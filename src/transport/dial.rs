//! Client side: validate first, then connect and upgrade.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::{translate, ClientConfig, Role};
use crate::engine::Engine;
use crate::error::DialError;
use crate::transport::{classify, SecureConnection};

/// Bound on obtaining the raw connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Source of raw client connections.
#[async_trait]
pub trait Connect: Send + Sync {
    /// Open a TCP connection to `addr`.
    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream>;
}

/// Plain TCP with `TCP_NODELAY`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connect for TcpConnector {
    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Dial the server named in `config` with the default timeout.
pub async fn dial<C, E>(
    config: &ClientConfig,
    connector: &C,
    engine: &E,
) -> Result<SecureConnection<E::Conn>, DialError>
where
    C: Connect + ?Sized,
    E: Engine + ?Sized,
{
    dial_with_timeout(config, connector, engine, DEFAULT_DIAL_TIMEOUT).await
}

/// Dial the server named in `config`.
///
/// The config is translated before any socket is opened, so a bad key or
/// address never reaches the network. `dial_timeout` bounds only the raw
/// connect; the engine bounds its own handshake.
pub async fn dial_with_timeout<C, E>(
    config: &ClientConfig,
    connector: &C,
    engine: &E,
    dial_timeout: Duration,
) -> Result<SecureConnection<E::Conn>, DialError>
where
    C: Connect + ?Sized,
    E: Engine + ?Sized,
{
    let channel = translate(config.into(), Role::Client, None)
        .map_err(|e| classify(e, DialError::InvalidKey, DialError::Config))?;
    let addr = channel.address();

    let raw = match timeout(dial_timeout, connector.connect(addr)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => return Err(DialError::Io(e)),
        Err(_) => return Err(DialError::Timeout(dial_timeout)),
    };
    let peer_addr = raw.peer_addr().unwrap_or(addr);

    tracing::debug!("connected to {}", peer_addr);

    match engine.upgrade_client(raw, &channel).await {
        Ok(conn) => Ok(SecureConnection::new(conn, peer_addr)),
        Err(e) => {
            tracing::warn!("upgrade to {} failed: {}", peer_addr, e);
            Err(DialError::UpgradeFailed(e))
        }
    }
}
