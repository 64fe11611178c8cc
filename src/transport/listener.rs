//! Server side: bind once, then validate and upgrade per accepted connection.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::addr::resolve_address;
use crate::config::{translate, Role, ServerConfig};
use crate::engine::Engine;
use crate::error::{AcceptError, BindError};
use crate::transport::{classify, SecureConnection};

/// Listener lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    /// Bound and accepting
    Listening,
    /// Closed; every `accept` returns [`AcceptError::Closed`]
    Closed,
}

/// A bound listener producing upgraded connections.
///
/// Share it behind an `Arc` to call [`close`](Self::close) from another task
/// while one is blocked in [`accept`](Self::accept).
pub struct Listener<E> {
    socket: Mutex<Option<Arc<TcpListener>>>,
    local_addr: SocketAddr,
    config: RwLock<ServerConfig>,
    shutdown: watch::Sender<bool>,
    engine: E,
}

/// Bind `address` and return a listener that upgrades with `engine`.
///
/// The server key is not checked here; it is validated on every accept so a
/// bad key can be fixed with [`Listener::set_config`] without rebinding.
pub async fn listen<E: Engine>(
    address: &str,
    config: ServerConfig,
    engine: E,
) -> Result<Listener<E>, BindError> {
    let addr = resolve_address(address)?;

    let socket = TcpListener::bind(addr)
        .await
        .map_err(|source| BindError::Io { addr, source })?;
    let local_addr = socket
        .local_addr()
        .map_err(|source| BindError::Io { addr, source })?;

    tracing::info!("listening on {}", local_addr);

    let (shutdown, _) = watch::channel(false);

    Ok(Listener {
        socket: Mutex::new(Some(Arc::new(socket))),
        local_addr,
        config: RwLock::new(config),
        shutdown,
        engine,
    })
}

impl<E: Engine> Listener<E> {
    /// Accept, validate and upgrade the next connection.
    ///
    /// A failure affects only the connection it happened on; the listener
    /// keeps serving.
    pub async fn accept(&self) -> Result<SecureConnection<E::Conn>, AcceptError> {
        let socket = self.socket.lock().clone().ok_or(AcceptError::Closed)?;

        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Err(AcceptError::Closed);
        }

        let (raw, peer_addr) = tokio::select! {
            accepted = socket.accept() => accepted.map_err(AcceptError::Io)?,
            _ = shutdown.changed() => return Err(AcceptError::Closed),
        };
        drop(socket);

        tracing::debug!("accepted raw connection from {}", peer_addr);

        let endpoint = self.local_addr.to_string();
        let translated = {
            let config = self.config.read();
            translate((&*config).into(), Role::Server, Some(&endpoint))
        };

        let channel = match translated {
            Ok(channel) => channel,
            Err(e) => {
                drop(raw);
                tracing::warn!("rejecting connection from {}: {}", peer_addr, e);
                return Err(classify(e, AcceptError::InvalidKey, AcceptError::Config));
            }
        };

        // Dropping the upgrade future on close also drops `raw`.
        let upgraded = tokio::select! {
            upgraded = self.engine.upgrade_server(raw, &channel) => upgraded,
            _ = shutdown.changed() => {
                tracing::debug!("listener closed during upgrade of {}", peer_addr);
                return Err(AcceptError::Closed);
            }
        };

        match upgraded {
            Ok(conn) => Ok(SecureConnection::new(conn, peer_addr)),
            Err(e) => {
                tracing::warn!("upgrade failed for {}: {}", peer_addr, e);
                Err(AcceptError::UpgradeFailed(e))
            }
        }
    }

    /// Stop listening. Wakes a pending [`accept`](Self::accept). Idempotent.
    pub fn close(&self) {
        if self.socket.lock().take().is_some() {
            tracing::info!("listener on {} closed", self.local_addr);
        }
        self.shutdown.send_replace(true);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        if self.socket.lock().is_some() {
            ListenerState::Listening
        } else {
            ListenerState::Closed
        }
    }

    /// The bound address, with the OS-assigned port if `:0` was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Replace the server config used for subsequent accepts.
    pub fn set_config(&self, config: ServerConfig) {
        *self.config.write() = config;
        tracing::debug!("server config replaced");
    }
}

impl<E> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("local_addr", &self.local_addr)
            .field("open", &self.socket.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<E> Drop for Listener<E> {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::config::{generate_config_pair, ConfigVariant, NamedServerConfig, TRANSPORT_NAME};
    use crate::engine::SealedEngine;
    use crate::transport::testing::{FailingEngine, PlainEngine};
    use crate::transport::{dial, TcpConnector};

    fn bad_key_config() -> ServerConfig {
        ServerConfig::Named(NamedServerConfig {
            server_address: "127.0.0.1:0".to_string(),
            server_private_key: STANDARD.encode([0u8; 32]),
            transport: TRANSPORT_NAME.to_string(),
        })
    }

    #[tokio::test]
    async fn test_listen_rejects_bad_address() {
        let (server, _) = generate_config_pair("127.0.0.1:0", ConfigVariant::Named).unwrap();
        let err = listen("localhost:0", server, PlainEngine).await.unwrap_err();
        assert!(matches!(err, BindError::Address(_)));
    }

    #[tokio::test]
    async fn test_end_to_end_exchange() {
        let (server, mut client) =
            generate_config_pair("127.0.0.1:0", ConfigVariant::Named).unwrap();
        let listener = listen("127.0.0.1:0", server, SealedEngine::new()).await.unwrap();

        if let crate::config::ClientConfig::Named(c) = &mut client {
            c.server_address = listener.local_addr().to_string();
        }

        let server_task = tokio::spawn(async move {
            let mut conn = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            conn.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, [0xde, 0xad, 0xbe, 0xef]);
            conn.write_all(&[0xca, 0xfe, 0xba, 0xbe]).await.unwrap();
            conn.shutdown().await.unwrap();
            listener.close();
        });

        let mut conn = dial(&client, &TcpConnector, &SealedEngine::new()).await.unwrap();
        conn.write_all(&[0xde, 0xad, 0xbe, 0xef]).await.unwrap();
        conn.flush().await.unwrap();

        let mut reply = Vec::new();
        conn.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, [0xca, 0xfe, 0xba, 0xbe]);

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_unblocks_accept() {
        let (server, _) = generate_config_pair("127.0.0.1:0", ConfigVariant::Named).unwrap();
        let listener = Arc::new(listen("127.0.0.1:0", server, PlainEngine).await.unwrap());
        assert_eq!(listener.state(), ListenerState::Listening);

        let pending = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.accept().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        listener.close();
        listener.close();

        let result = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .expect("accept did not return after close")
            .unwrap();
        assert!(matches!(result, Err(AcceptError::Closed)));
        assert_eq!(listener.state(), ListenerState::Closed);
        assert!(matches!(listener.accept().await, Err(AcceptError::Closed)));
    }

    #[tokio::test]
    async fn test_close_interrupts_pending_upgrade() {
        let (server, _) = generate_config_pair("127.0.0.1:0", ConfigVariant::Named).unwrap();
        let listener = Arc::new(listen("127.0.0.1:0", server, SealedEngine::new()).await.unwrap());

        // Connects but never sends a client hello.
        let mut silent = TcpStream::connect(listener.local_addr()).await.unwrap();

        let pending = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.accept().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        listener.close();

        let result = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .expect("accept stayed blocked in the handshake after close")
            .unwrap();
        assert!(matches!(result, Err(AcceptError::Closed)));

        let mut buf = [0u8; 1];
        assert_eq!(silent.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_key_rejects_each_connection_until_replaced() {
        let listener = listen("127.0.0.1:0", bad_key_config(), PlainEngine)
            .await
            .unwrap();
        let addr = listener.local_addr();

        for _ in 0..2 {
            let mut peer = TcpStream::connect(addr).await.unwrap();
            let err = listener.accept().await.unwrap_err();
            assert!(matches!(err, AcceptError::InvalidKey(_)));

            let mut buf = [0u8; 1];
            assert_eq!(peer.read(&mut buf).await.unwrap(), 0);
        }
        assert_eq!(listener.state(), ListenerState::Listening);

        let (good, _) = generate_config_pair("127.0.0.1:0", ConfigVariant::Named).unwrap();
        listener.set_config(good);

        let _peer = TcpStream::connect(addr).await.unwrap();
        let conn = listener.accept().await.unwrap();
        assert_eq!(conn.peer_addr().ip(), addr.ip());
    }

    #[tokio::test]
    async fn test_failed_upgrade_closes_socket() {
        let (server, _) = generate_config_pair("127.0.0.1:0", ConfigVariant::Named).unwrap();
        let listener = listen("127.0.0.1:0", server, FailingEngine).await.unwrap();

        let mut peer = TcpStream::connect(listener.local_addr()).await.unwrap();
        let err = listener.accept().await.unwrap_err();
        assert!(matches!(err, AcceptError::UpgradeFailed(_)));

        let mut buf = [0u8; 1];
        assert_eq!(peer.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persistent_server_uses_listen_address() {
        let (server, _) =
            generate_config_pair("127.0.0.1:9", ConfigVariant::Persistent).unwrap();
        assert_eq!(server.address(), None);

        let listener = listen("127.0.0.1:0", server, PlainEngine).await.unwrap();
        let _peer = TcpStream::connect(listener.local_addr()).await.unwrap();
        assert!(listener.accept().await.is_ok());
    }
}
