//! Authenticated Encryption with Associated Data (AEAD).
//!
//! ChaCha20-Poly1305 record protection for the sealed engine's data phase.
//! Failures surface as `io::ErrorKind::InvalidData` because they are only
//! ever hit while reading or writing a stream.

use std::io;

use chacha20poly1305::{
    aead::{Aead as AeadTrait, KeyInit, Payload},
    ChaCha20Poly1305,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// A symmetric key for AEAD operations.
///
/// Automatically zeroized when dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey([u8; KEY_SIZE]);

impl AeadKey {
    /// Create a new AEAD key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

/// A per-record nonce: the direction IV XORed with a big-endian sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Build the nonce for record number `seq` under `iv`.
    pub fn for_record(iv: &[u8; NONCE_SIZE], seq: u64) -> Self {
        let mut nonce = *iv;
        for (n, s) in nonce[NONCE_SIZE - 8..].iter_mut().zip(seq.to_be_bytes()) {
            *n ^= s;
        }
        Self(nonce)
    }

    /// Get the raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// ChaCha20-Poly1305 AEAD cipher.
pub struct Aead {
    cipher: ChaCha20Poly1305,
}

impl Aead {
    /// Create a new AEAD instance with the given key.
    pub fn new(key: &AeadKey) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new((&key.0).into()),
        }
    }

    /// Encrypt plaintext, returning ciphertext || tag.
    pub fn encrypt(&self, nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> io::Result<Vec<u8>> {
        self.cipher
            .encrypt(nonce.as_bytes().into(), Payload { msg: plaintext, aad })
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "record encryption failed"))
    }

    /// Decrypt ciphertext || tag.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the record is truncated or fails authentication.
    pub fn decrypt(&self, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> io::Result<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("record shorter than tag: {} bytes", ciphertext.len()),
            ));
        }

        self.cipher
            .decrypt(nonce.as_bytes().into(), Payload { msg: ciphertext, aad })
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "record authentication failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> AeadKey {
        let mut key = [0u8; KEY_SIZE];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        AeadKey::from_bytes(key)
    }

    #[test]
    fn test_encrypt_decrypt() {
        let aead = Aead::new(&test_key());
        let nonce = Nonce::for_record(&[7u8; NONCE_SIZE], 1);

        let ciphertext = aead.encrypt(&nonce, b"Hello, World!", b"hdr").unwrap();
        assert_eq!(ciphertext.len(), 13 + TAG_SIZE);

        let decrypted = aead.decrypt(&nonce, &ciphertext, b"hdr").unwrap();
        assert_eq!(decrypted, b"Hello, World!");
    }

    #[test]
    fn test_wrong_key_fails() {
        let aead1 = Aead::new(&test_key());
        let aead2 = Aead::new(&AeadKey::from_bytes([0x42u8; KEY_SIZE]));
        let nonce = Nonce::for_record(&[0u8; NONCE_SIZE], 0);

        let ciphertext = aead1.encrypt(&nonce, b"secret data", b"").unwrap();
        let err = aead2.decrypt(&nonce, &ciphertext, b"").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_tampered_header_fails() {
        let aead = Aead::new(&test_key());
        let nonce = Nonce::for_record(&[0u8; NONCE_SIZE], 3);

        let ciphertext = aead.encrypt(&nonce, b"secret data", b"header-1").unwrap();
        assert!(aead.decrypt(&nonce, &ciphertext, b"header-2").is_err());
    }

    #[test]
    fn test_truncated_record_fails() {
        let aead = Aead::new(&test_key());
        let nonce = Nonce::for_record(&[0u8; NONCE_SIZE], 0);
        assert!(aead.decrypt(&nonce, &[0u8; TAG_SIZE - 1], b"").is_err());
    }

    #[test]
    fn test_record_nonces_differ() {
        let iv = [0xa5u8; NONCE_SIZE];
        let first = Nonce::for_record(&iv, 0);
        let second = Nonce::for_record(&iv, 1);

        assert_eq!(first.as_bytes(), &iv);
        assert_ne!(first, second);
        assert_eq!(second.as_bytes()[NONCE_SIZE - 1], 0xa5 ^ 0x01);
    }
}
