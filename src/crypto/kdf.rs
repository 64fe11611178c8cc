//! Key Derivation Functions.
//!
//! HKDF-SHA256 turns the handshake's two P-256 agreements into per-direction
//! record keys plus a confirmation key; HMAC-SHA256 produces the server's
//! key-confirmation tag.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{AeadKey, CONFIRM_TAG_SIZE, KEY_SIZE, NONCE_SIZE};

/// HKDF salt for the sealed handshake.
const HANDSHAKE_SALT: &[u8] = b"ptbridge-sealed-v1";

/// Keys derived once per connection.
///
/// Contains separate keys for client-to-server and server-to-client
/// directions plus the key the server uses to prove it holds the static key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    client_key: [u8; KEY_SIZE],
    server_key: [u8; KEY_SIZE],
    client_iv: [u8; NONCE_SIZE],
    server_iv: [u8; NONCE_SIZE],
    confirm_key: [u8; KEY_SIZE],
}

impl SessionKeys {
    /// Derive session keys.
    ///
    /// # Arguments
    ///
    /// * `secrets` - Concatenated DH outputs, in an order both sides agree on
    /// * `context` - Transcript bound into every derived key
    pub fn derive(secrets: &[&[u8]], context: &[u8]) -> Self {
        let mut ikm = secrets.concat();
        let hkdf = Hkdf::<Sha256>::new(Some(HANDSHAKE_SALT), &ikm);

        let mut keys = Self {
            client_key: [0u8; KEY_SIZE],
            server_key: [0u8; KEY_SIZE],
            client_iv: [0u8; NONCE_SIZE],
            server_iv: [0u8; NONCE_SIZE],
            confirm_key: [0u8; KEY_SIZE],
        };

        let outputs: [(&[u8], &mut [u8]); 5] = [
            (b"client key".as_slice(), &mut keys.client_key[..]),
            (b"server key".as_slice(), &mut keys.server_key[..]),
            (b"client iv".as_slice(), &mut keys.client_iv[..]),
            (b"server iv".as_slice(), &mut keys.server_iv[..]),
            (b"confirm key".as_slice(), &mut keys.confirm_key[..]),
        ];
        for (label, out) in outputs {
            let info = [label, context].concat();
            hkdf.expand(&info, out)
                .expect("HKDF output length is within 255*HashLen");
        }

        ikm.zeroize();
        keys
    }

    /// Get the client-to-server encryption key.
    pub fn client_key(&self) -> AeadKey {
        AeadKey::from_bytes(self.client_key)
    }

    /// Get the server-to-client encryption key.
    pub fn server_key(&self) -> AeadKey {
        AeadKey::from_bytes(self.server_key)
    }

    /// Get the client-to-server IV.
    pub fn client_iv(&self) -> &[u8; NONCE_SIZE] {
        &self.client_iv
    }

    /// Get the server-to-client IV.
    pub fn server_iv(&self) -> &[u8; NONCE_SIZE] {
        &self.server_iv
    }

    /// Compute the key-confirmation tag over `transcript`.
    pub fn confirmation(&self, transcript: &[u8]) -> [u8; CONFIRM_TAG_SIZE] {
        compute_confirmation(&self.confirm_key, transcript)
    }

    /// Check a received confirmation tag in constant time.
    pub fn verify_confirmation(&self, transcript: &[u8], tag: &[u8]) -> bool {
        let mut mac = confirmation_mac(&self.confirm_key);
        mac.update(transcript);
        mac.verify_slice(tag).is_ok()
    }
}

fn confirmation_mac(key: &[u8]) -> Hmac<Sha256> {
    <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC can take key of any size")
}

fn compute_confirmation(key: &[u8], transcript: &[u8]) -> [u8; CONFIRM_TAG_SIZE] {
    let mut mac = confirmation_mac(key);
    mac.update(transcript);

    let mut tag = [0u8; CONFIRM_TAG_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = SessionKeys::derive(&[&[1u8; 32][..], &[2u8; 32][..]], b"transcript");
        let b = SessionKeys::derive(&[&[1u8; 32][..], &[2u8; 32][..]], b"transcript");

        assert_eq!(a.client_key, b.client_key);
        assert_eq!(a.server_iv, b.server_iv);
        assert_ne!(a.client_key, a.server_key);
        assert_ne!(a.client_iv, a.server_iv);
    }

    #[test]
    fn test_context_separates_keys() {
        let a = SessionKeys::derive(&[&[1u8; 32][..]], b"SMTPClient|SMTPServer");
        let b = SessionKeys::derive(&[&[1u8; 32][..]], b"SMTPServer|SMTPClient");
        assert_ne!(a.client_key, b.client_key);
    }

    #[test]
    fn test_confirmation() {
        let keys = SessionKeys::derive(&[&[9u8; 32][..]], b"ctx");
        let tag = keys.confirmation(b"hello");

        assert!(keys.verify_confirmation(b"hello", &tag));
        assert!(!keys.verify_confirmation(b"hellp", &tag));
        assert!(!keys.verify_confirmation(b"hello", &tag[..16]));

        let other = SessionKeys::derive(&[&[8u8; 32][..]], b"ctx");
        assert!(!other.verify_confirmation(b"hello", &tag));
    }

    #[test]
    fn test_confirmation_rejects_any_flipped_bit() {
        let keys = SessionKeys::derive(&[&[3u8; 32][..]], b"ctx");
        let tag = keys.confirmation(b"transcript");

        for i in [0, 15, 31] {
            let mut forged = tag;
            forged[i] ^= 0x01;
            assert!(!keys.verify_confirmation(b"transcript", &forged));
        }
        assert!(!keys.verify_confirmation(b"transcript", &[]));
    }

    #[test]
    fn test_derived_keys_are_populated() {
        let keys = SessionKeys::derive(&[&[5u8; 32][..]], b"ctx");

        assert_ne!(keys.client_key, [0u8; KEY_SIZE]);
        assert_ne!(keys.server_key, [0u8; KEY_SIZE]);
        assert_ne!(keys.client_iv, [0u8; NONCE_SIZE]);
        assert_ne!(keys.server_iv, [0u8; NONCE_SIZE]);
        assert_ne!(keys.confirm_key, [0u8; KEY_SIZE]);
    }
}
