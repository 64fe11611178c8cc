//! Error types for ptbridge.
//!
//! Each component has its own error enum so callers can match on the failure
//! that matters to them. [`Error`] aggregates all of them for code that only
//! wants to propagate with `?`.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for ptbridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Any error produced by this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Key generation or validation failed
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Address string could not be resolved
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Configuration could not be translated
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Listener could not be bound
    #[error(transparent)]
    Bind(#[from] BindError),

    /// Listener failed to produce a connection
    #[error(transparent)]
    Accept(#[from] AcceptError),

    /// Outgoing connection failed
    #[error(transparent)]
    Dial(#[from] DialError),

    /// Generic I/O failure (config files, streams)
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Key material errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The random source failed while drawing a key
    #[error("key generation failed: {0}")]
    Generation(String),

    /// Bytes are not a valid scalar or point for P-256
    #[error("invalid key: {0}")]
    Validation(String),
}

impl KeyError {
    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        KeyError::Validation(msg.into())
    }
}

/// A `host:port` string that does not name a literal IP endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid address {input:?}: {reason}")]
pub struct AddressError {
    /// The offending input, verbatim
    pub input: String,
    /// What was wrong with it
    pub reason: &'static str,
}

impl AddressError {
    pub(crate) fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// Configuration translation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Named-variant config with a transport other than the sentinel
    #[error("unsupported transport {0:?}")]
    UnsupportedTransport(String),

    /// Persistent-variant key string of the wrong length
    #[error("invalid key length: expected {expected} hex characters, got {actual}")]
    InvalidKeyLength {
        /// Required number of characters
        expected: usize,
        /// Number of characters supplied
        actual: usize,
    },

    /// Key string is not valid base64/hex
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Key decoded but is not usable on the curve
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// Server config handed to a client path or vice versa
    #[error("config is for the {actual} role, {expected} role required")]
    RoleMismatch {
        /// Role the caller asked for
        expected: &'static str,
        /// Role the config describes
        actual: &'static str,
    },

    /// Neither the config nor the caller supplied an address
    #[error("no server address configured")]
    MissingAddress,

    /// Address present but not resolvable
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Config document could not be (de)serialised
    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Whether this error concerns the key material rather than the config shape.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            ConfigError::InvalidKeyLength { .. }
                | ConfigError::InvalidKeyEncoding(_)
                | ConfigError::InvalidKey(_)
        )
    }
}

/// Listener bind errors.
#[derive(Error, Debug)]
pub enum BindError {
    /// Listen address is malformed
    #[error(transparent)]
    Address(#[from] AddressError),

    /// OS refused the bind
    #[error("failed to bind {addr}: {source}")]
    Io {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Errors from [`Listener::accept`](crate::transport::Listener::accept).
#[derive(Error, Debug)]
pub enum AcceptError {
    /// The listener has been closed
    #[error("listener closed")]
    Closed,

    /// Accepting the raw connection failed
    #[error("accept failed: {0}")]
    Io(#[source] io::Error),

    /// Server key rejected; the accepted connection was closed
    #[error("server key rejected: {0}")]
    InvalidKey(#[source] ConfigError),

    /// Server config could not be translated; the accepted connection was closed
    #[error("server config rejected: {0}")]
    Config(#[source] ConfigError),

    /// Engine handshake failed; the accepted connection was closed
    #[error("upgrade failed: {0}")]
    UpgradeFailed(#[source] io::Error),
}

/// Errors from [`dial`](crate::transport::dial).
#[derive(Error, Debug)]
pub enum DialError {
    /// Raw connection did not complete in time
    #[error("dial timed out after {0:?}")]
    Timeout(Duration),

    /// Raw connection failed
    #[error("dial failed: {0}")]
    Io(#[source] io::Error),

    /// Server public key rejected; nothing was sent
    #[error("server key rejected: {0}")]
    InvalidKey(#[source] ConfigError),

    /// Client config could not be translated
    #[error("client config rejected: {0}")]
    Config(#[source] ConfigError),

    /// Engine handshake failed; the raw connection was closed
    #[error("upgrade failed: {0}")]
    UpgradeFailed(#[source] io::Error),
}

impl AcceptError {
    /// How long an accept loop should pause before trying again.
    ///
    /// Socket-level failures (e.g. `EMFILE`) tend to repeat immediately, so
    /// they get a short backoff. Per-connection rejections do not.
    pub fn retry_delay(&self) -> Duration {
        match self {
            AcceptError::Io(_) => ACCEPT_IO_BACKOFF,
            _ => Duration::ZERO,
        }
    }
}

/// Pause after a failed raw accept.
const ACCEPT_IO_BACKOFF: Duration = Duration::from_millis(100);

impl DialError {
    /// Check if this error is worth retrying at a higher level
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DialError::Timeout(_) | DialError::Io(_))
    }
}
