//! Cryptographic primitives for ptbridge.
//!
//! This module provides:
//! - P-256 key generation and validation (the channel's identity keys)
//! - ChaCha20-Poly1305 record protection
//! - HKDF session key derivation
//! - Secure random number generation
//!
//! All secret material is zeroized on drop to prevent memory leakage.

mod aead;
mod kdf;
mod keys;
mod random;

pub use aead::{Aead, AeadKey, Nonce};
pub use kdf::SessionKeys;
pub use keys::{
    generate_key_pair, validate_private_key, validate_public_key, KeyPair, PrivateKey, PublicKey,
    SharedSecret,
};
pub use random::SecureRandom;

/// Size of symmetric keys in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of AEAD nonce in bytes (96 bits for ChaCha20-Poly1305)
pub const NONCE_SIZE: usize = 12;

/// Size of AEAD authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of a P-256 private scalar in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;

/// Size of a compact P-256 public key (X coordinate only)
pub const COMPACT_PUBLIC_KEY_SIZE: usize = 32;

/// Size of the handshake key-confirmation tag (full HMAC-SHA256 output)
pub const CONFIRM_TAG_SIZE: usize = 32;
