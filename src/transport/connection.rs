//! Upgraded connection handle.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A connection that completed validation, translation and engine upgrade.
///
/// Reads and writes go straight to the engine's stream.
#[derive(Debug)]
pub struct SecureConnection<C> {
    inner: C,
    peer_addr: SocketAddr,
}

impl<C> SecureConnection<C> {
    pub(crate) fn new(inner: C, peer_addr: SocketAddr) -> Self {
        Self { inner, peer_addr }
    }

    /// Remote endpoint of the underlying TCP connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get a reference to the engine stream.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// Unwrap the engine stream.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: AsyncRead + Unpin> AsyncRead for SecureConnection<C> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<C: AsyncWrite + Unpin> AsyncWrite for SecureConnection<C> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
