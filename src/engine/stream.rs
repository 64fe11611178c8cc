//! Record-protected byte stream.
//!
//! Plaintext is cut into records framed like TLS application data
//! (`0x17 0x03 0x03 len`) and sealed with ChaCha20-Poly1305. The five-byte
//! header is the AAD, and each direction uses its own key, IV and sequence
//! counter.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::crypto::{Aead, AeadKey, Nonce, NONCE_SIZE, TAG_SIZE};

/// Largest plaintext carried in one record.
pub const MAX_RECORD_PLAINTEXT: usize = 16 * 1024;

const RECORD_TYPE: u8 = 0x17;
const RECORD_VERSION: [u8; 2] = [0x03, 0x03];
const HEADER_LEN: usize = 5;
const MAX_RECORD_BODY: usize = MAX_RECORD_PLAINTEXT + TAG_SIZE;
const READ_CHUNK: usize = 8 * 1024;

/// One direction's cipher state.
struct Direction {
    aead: Aead,
    iv: [u8; NONCE_SIZE],
    seq: u64,
}

impl Direction {
    fn new(key: &AeadKey, iv: &[u8; NONCE_SIZE]) -> Self {
        Self {
            aead: Aead::new(key),
            iv: *iv,
            seq: 0,
        }
    }

    fn next_nonce(&mut self) -> io::Result<Nonce> {
        let nonce = Nonce::for_record(&self.iv, self.seq);
        self.seq = self
            .seq
            .checked_add(1)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "record sequence exhausted"))?;
        Ok(nonce)
    }
}

/// An upgraded connection from [`SealedEngine`](super::SealedEngine).
///
/// Implements [`AsyncRead`] and [`AsyncWrite`]; callers see plain bytes.
pub struct SealedStream<S> {
    inner: S,
    send: Direction,
    recv: Direction,
    /// Raw bytes received but not yet opened
    incoming: BytesMut,
    /// Opened bytes not yet handed to the reader
    plaintext: BytesMut,
    /// Sealed bytes not yet written to `inner`
    outgoing: BytesMut,
    read_eof: bool,
}

impl<S> SealedStream<S> {
    pub(crate) fn new(
        inner: S,
        send_key: &AeadKey,
        send_iv: &[u8; NONCE_SIZE],
        recv_key: &AeadKey,
        recv_iv: &[u8; NONCE_SIZE],
    ) -> Self {
        Self {
            inner,
            send: Direction::new(send_key, send_iv),
            recv: Direction::new(recv_key, recv_iv),
            incoming: BytesMut::new(),
            plaintext: BytesMut::new(),
            outgoing: BytesMut::new(),
            read_eof: false,
        }
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    fn seal_record(&mut self, plaintext: &[u8]) -> io::Result<()> {
        let body_len = (plaintext.len() + TAG_SIZE) as u16;
        let mut header = [0u8; HEADER_LEN];
        header[0] = RECORD_TYPE;
        header[1..3].copy_from_slice(&RECORD_VERSION);
        header[3..].copy_from_slice(&body_len.to_be_bytes());

        let nonce = self.send.next_nonce()?;
        let ciphertext = self.send.aead.encrypt(&nonce, plaintext, &header)?;

        self.outgoing.reserve(HEADER_LEN + ciphertext.len());
        self.outgoing.extend_from_slice(&header);
        self.outgoing.extend_from_slice(&ciphertext);
        Ok(())
    }

    /// Open the next complete record in `incoming`, if there is one.
    fn open_record(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.incoming.len() < HEADER_LEN {
            return Ok(None);
        }

        if self.incoming[0] != RECORD_TYPE || self.incoming[1..3] != RECORD_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unexpected record header",
            ));
        }

        let body_len = u16::from_be_bytes([self.incoming[3], self.incoming[4]]) as usize;
        if !(TAG_SIZE..=MAX_RECORD_BODY).contains(&body_len) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("record length {} out of range", body_len),
            ));
        }

        if self.incoming.len() < HEADER_LEN + body_len {
            return Ok(None);
        }

        let header = self.incoming.split_to(HEADER_LEN);
        let body = self.incoming.split_to(body_len);
        let nonce = self.recv.next_nonce()?;
        self.recv.aead.decrypt(&nonce, &body, &header).map(Some)
    }
}

impl<S> fmt::Debug for SealedStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedStream")
            .field("send_seq", &self.send.seq)
            .field("recv_seq", &self.recv.seq)
            .field("read_eof", &self.read_eof)
            .finish_non_exhaustive()
    }
}

impl<S: AsyncWrite + Unpin> SealedStream<S> {
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while !self.outgoing.is_empty() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.outgoing))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.outgoing.advance(n);
        }
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for SealedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            if !this.plaintext.is_empty() {
                let n = buf.remaining().min(this.plaintext.len());
                buf.put_slice(&this.plaintext.split_to(n));
                return Poll::Ready(Ok(()));
            }

            if let Some(record) = this.open_record()? {
                this.plaintext.extend_from_slice(&record);
                continue;
            }

            if this.read_eof {
                if this.incoming.is_empty() {
                    return Poll::Ready(Ok(()));
                }
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-record",
                )));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let mut chunk_buf = ReadBuf::new(&mut chunk);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut chunk_buf))?;

            let filled = chunk_buf.filled();
            if filled.is_empty() {
                this.read_eof = true;
            } else {
                this.incoming.extend_from_slice(filled);
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for SealedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;

        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let n = buf.len().min(MAX_RECORD_PLAINTEXT);
        this.seal_record(&buf[..n])?;

        // The record is buffered either way; a pending drain resumes on the next call.
        if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
            return Poll::Ready(Err(e));
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}
