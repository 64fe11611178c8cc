//! Sealed handshake.
//!
//! One round trip. The client sends a fresh compact P-256 key; the server
//! answers with its own fresh key and an HMAC over the transcript, keyed from
//! a secret only the holder of the static private key can compute. Record
//! keys mix the static and ephemeral agreements, so a passive observer who
//! later learns the static key still cannot open old sessions.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::{
    ChannelKey, HandshakeMode, SecureChannelConfig, CLIENT_MODE_TAG, SERVER_MODE_TAG,
};
use crate::crypto::{
    generate_key_pair, PublicKey, SessionKeys, COMPACT_PUBLIC_KEY_SIZE, CONFIRM_TAG_SIZE,
};
use crate::engine::{Engine, SealedStream};

/// Default bound on the handshake round trip.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

const SERVER_HELLO_SIZE: usize = COMPACT_PUBLIC_KEY_SIZE + CONFIRM_TAG_SIZE;

/// The bundled [`Engine`]: sealed handshake plus ChaCha20-Poly1305 records.
#[derive(Clone, Debug)]
pub struct SealedEngine {
    handshake_timeout: Duration,
}

impl SealedEngine {
    /// Create an engine with the default 30 second handshake timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the handshake timeout.
    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    async fn bounded<T, F>(&self, fut: F) -> io::Result<T>
    where
        F: std::future::Future<Output = io::Result<T>>,
    {
        timeout(self.handshake_timeout, fut)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "handshake timed out"))?
    }
}

impl Default for SealedEngine {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

#[async_trait]
impl Engine for SealedEngine {
    type Conn = SealedStream<TcpStream>;

    async fn upgrade_client(
        &self,
        raw: TcpStream,
        config: &SecureChannelConfig,
    ) -> io::Result<Self::Conn> {
        self.bounded(client_handshake(raw, config)).await
    }

    async fn upgrade_server(
        &self,
        raw: TcpStream,
        config: &SecureChannelConfig,
    ) -> io::Result<Self::Conn> {
        self.bounded(server_handshake(raw, config)).await
    }
}

/// Run the client side of the sealed handshake over any byte stream.
pub async fn client_handshake<S>(
    mut stream: S,
    config: &SecureChannelConfig,
) -> io::Result<SealedStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let server_static = match (config.mode(), config.key()) {
        (HandshakeMode::Client, ChannelKey::ServerPublic(public)) => public,
        _ => return Err(wrong_side(HandshakeMode::Client)),
    };

    let ephemeral = generate_key_pair().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let client_hello = ephemeral.public().to_bytes();
    stream.write_all(&client_hello).await?;
    stream.flush().await?;

    let mut server_hello = [0u8; SERVER_HELLO_SIZE];
    stream.read_exact(&mut server_hello).await?;
    let (server_ephemeral_bytes, tag) = server_hello.split_at(COMPACT_PUBLIC_KEY_SIZE);
    let server_ephemeral = PublicKey::from_bytes(server_ephemeral_bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let static_shared = ephemeral.private().diffie_hellman(server_static);
    let ephemeral_shared = ephemeral.private().diffie_hellman(&server_ephemeral);

    let transcript = transcript(server_static, &client_hello, server_ephemeral_bytes);
    let keys = SessionKeys::derive(
        &[static_shared.as_bytes(), ephemeral_shared.as_bytes()],
        &transcript,
    );

    if !keys.verify_confirmation(&transcript, tag) {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "server failed key confirmation",
        ));
    }

    tracing::debug!("sealed handshake complete (client)");

    Ok(SealedStream::new(
        stream,
        &keys.client_key(),
        keys.client_iv(),
        &keys.server_key(),
        keys.server_iv(),
    ))
}

/// Run the server side of the sealed handshake over any byte stream.
pub async fn server_handshake<S>(
    mut stream: S,
    config: &SecureChannelConfig,
) -> io::Result<SealedStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let server_static = match (config.mode(), config.key()) {
        (HandshakeMode::Server, ChannelKey::ServerPrivate(private)) => private,
        _ => return Err(wrong_side(HandshakeMode::Server)),
    };

    let mut client_hello = [0u8; COMPACT_PUBLIC_KEY_SIZE];
    stream.read_exact(&mut client_hello).await?;
    let client_ephemeral = PublicKey::from_bytes(&client_hello)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let ephemeral = generate_key_pair().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let server_ephemeral_bytes = ephemeral.public().to_bytes();

    let static_shared = server_static.diffie_hellman(&client_ephemeral);
    let ephemeral_shared = ephemeral.private().diffie_hellman(&client_ephemeral);

    let transcript = transcript(
        &server_static.public_key(),
        &client_hello,
        &server_ephemeral_bytes,
    );
    let keys = SessionKeys::derive(
        &[static_shared.as_bytes(), ephemeral_shared.as_bytes()],
        &transcript,
    );

    let mut server_hello = Vec::with_capacity(SERVER_HELLO_SIZE);
    server_hello.extend_from_slice(&server_ephemeral_bytes);
    server_hello.extend_from_slice(&keys.confirmation(&transcript));
    stream.write_all(&server_hello).await?;
    stream.flush().await?;

    tracing::debug!("sealed handshake complete (server)");

    Ok(SealedStream::new(
        stream,
        &keys.server_key(),
        keys.server_iv(),
        &keys.client_key(),
        keys.client_iv(),
    ))
}

/// Both mode tags, the server identity and both ephemeral keys.
///
/// The server identity is bound by X coordinate only: a client holding the
/// compact form of an odd-Y key sees the negated point, which agrees on every
/// ECDH output.
fn transcript(server_static: &PublicKey, client_hello: &[u8], server_ephemeral: &[u8]) -> Vec<u8> {
    let server_static = server_static.x_coordinate();
    [
        CLIENT_MODE_TAG.as_bytes(),
        SERVER_MODE_TAG.as_bytes(),
        server_static.as_slice(),
        client_hello,
        server_ephemeral,
    ]
    .concat()
}

fn wrong_side(expected: HandshakeMode) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("config is not a {} config", expected.tag()),
    )
}
