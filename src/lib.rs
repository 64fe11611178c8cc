//! # ptbridge
//!
//! A pluggable-transport adapter. It turns a JSON transport config into a
//! validated secure-channel configuration, opens or accepts TCP connections,
//! and hands each socket to a secure-channel engine for upgrade.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application                           │
//! ├─────────────────────────────────────────────────────────┤
//! │  transport   listen / accept / close, dial               │
//! ├─────────────────────────────────────────────────────────┤
//! │  engine      Engine trait, SealedEngine reference       │
//! ├─────────────────────────────────────────────────────────┤
//! │  config      Named / Persistent schemas, translate      │
//! ├──────────────────────────┬──────────────────────────────┤
//! │  addr (literal IP only)  │  crypto (P-256, HKDF, AEAD)  │
//! └──────────────────────────┴──────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! 1. **Fail fast**: key and address problems are reported before a dial
//!    opens a socket.
//! 2. **No half-open connections**: every failure after a socket exists
//!    closes it.
//! 3. **Contained curve faults**: key validation never panics.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod addr;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod transport;

pub use addr::resolve_address;
pub use config::{translate, ClientConfig, Role, SecureChannelConfig, ServerConfig};
pub use engine::{Engine, SealedEngine};
pub use error::{Error, Result};
pub use transport::{dial, listen, Listener, SecureConnection, TcpConnector};
