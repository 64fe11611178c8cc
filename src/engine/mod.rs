//! Secure-channel engine capability.
//!
//! The establisher never speaks a handshake itself: it hands a raw TCP stream
//! and a validated [`SecureChannelConfig`] to an [`Engine`] and gets back an
//! upgraded byte stream. Any obfuscation protocol can sit behind this trait;
//! tests substitute fakes.
//!
//! [`SealedEngine`] is the bundled implementation:
//!
//! ```text
//! Client                                         Server
//!   |  eph_c (32, compact P-256)                    |
//!   |---------------------------------------------->|
//!   |  eph_s (32) || HMAC(confirm_key, transcript)  |
//!   |<----------------------------------------------|
//!   |                                               |
//!   |  keys = HKDF(ECDH(eph_c, S) || ECDH(eph_c, eph_s), transcript)
//!   |                                               |
//!   |======= 0x17 0x03 0x03 len | ChaCha20-Poly1305 =======|
//! ```

mod handshake;
mod stream;

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::config::SecureChannelConfig;

pub use handshake::{client_handshake, server_handshake, SealedEngine};
pub use stream::{SealedStream, MAX_RECORD_PLAINTEXT};

/// The two-method upgrade capability consumed by the listener and dialer.
///
/// Both methods take ownership of the raw stream. On error the engine must
/// drop it, which closes the socket; the establisher relies on this.
#[async_trait]
pub trait Engine: Send + Sync {
    /// The upgraded stream type.
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Run the client side of the handshake over `raw`.
    async fn upgrade_client(
        &self,
        raw: TcpStream,
        config: &SecureChannelConfig,
    ) -> io::Result<Self::Conn>;

    /// Run the server side of the handshake over `raw`.
    async fn upgrade_server(
        &self,
        raw: TcpStream,
        config: &SecureChannelConfig,
    ) -> io::Result<Self::Conn>;
}
