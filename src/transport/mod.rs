//! Connection establishment.
//!
//! Opens raw TCP connections, validates and translates the transport config,
//! and hands the socket to an [`Engine`](crate::engine::Engine) for upgrade.
//!
//! ```text
//!   dial:    translate ──► connect (bounded) ──► upgrade_client ──► SecureConnection
//!   accept:  accept raw ──► translate ──► upgrade_server ──► SecureConnection
//! ```
//!
//! Any failure after a socket exists drops that socket before the error is
//! returned, so callers never see a half-established connection.

mod connection;
mod dial;
mod listener;

pub use connection::SecureConnection;
pub use dial::{dial, dial_with_timeout, Connect, TcpConnector, DEFAULT_DIAL_TIMEOUT};
pub use listener::{listen, Listener, ListenerState};

use crate::error::ConfigError;

/// Split translation failures into key problems and everything else.
fn classify<T>(
    err: ConfigError,
    key: impl FnOnce(ConfigError) -> T,
    other: impl FnOnce(ConfigError) -> T,
) -> T {
    if err.is_key_error() {
        key(err)
    } else {
        other(err)
    }
}
