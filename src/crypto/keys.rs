//! P-256 key material and validation.
//!
//! Type-safe wrappers around `p256` that keep malformed keys away from the
//! engine. Every call into curve arithmetic on untrusted bytes runs inside
//! [`std::panic::catch_unwind`], so hostile input degrades to an error or
//! `false` rather than unwinding through the caller.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use base64::{engine::general_purpose::STANDARD, Engine};
use p256::ecdh::{self, EphemeralSecret};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use zeroize::Zeroizing;

use crate::crypto::random::SecureRandom;
use crate::crypto::{COMPACT_PUBLIC_KEY_SIZE, PRIVATE_KEY_SIZE};
use crate::error::KeyError;

/// SEC1 tag for a compressed point with even Y.
const SEC1_EVEN_Y: u8 = 0x02;

/// SEC1 compressed point length.
const SEC1_COMPRESSED_SIZE: usize = 33;

/// SEC1 uncompressed point length.
const SEC1_UNCOMPRESSED_SIZE: usize = 65;

/// A long-term P-256 private key (a non-zero scalar below the group order).
///
/// The inner `p256::SecretKey` zeroizes itself on drop.
#[derive(Clone)]
pub struct PrivateKey(p256::SecretKey);

impl PrivateKey {
    /// Decode a 32-byte big-endian scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(KeyError::validation(format!(
                "private key must be {} bytes, got {}",
                PRIVATE_KEY_SIZE,
                bytes.len()
            )));
        }

        guarded(|| p256::SecretKey::from_slice(bytes))
            .ok_or_else(|| KeyError::validation("panicked on private key decode"))?
            .map(Self)
            .map_err(|_| KeyError::validation("private key is not a valid P-256 scalar"))
    }

    /// Export the scalar bytes.
    ///
    /// # Security
    ///
    /// The returned buffer is zeroized when dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_SIZE]> {
        let mut out = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
        out.copy_from_slice(self.0.to_bytes().as_slice());
        out
    }

    /// Standard base64 of the scalar bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes().as_slice())
    }

    /// Lowercase hex of the scalar bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes().as_slice())
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    /// Perform P-256 Diffie-Hellman key agreement.
    pub fn diffie_hellman(&self, their_public: &PublicKey) -> SharedSecret {
        SharedSecret(ecdh::diffie_hellman(
            self.0.to_nonzero_scalar(),
            their_public.0.as_affine(),
        ))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A P-256 public key, guaranteed to be a point on the curve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(p256::PublicKey);

impl PublicKey {
    /// Decode a public key.
    ///
    /// Accepts the 32-byte compact form (X coordinate, even Y implied) as well
    /// as SEC1 compressed (33 bytes) and uncompressed (65 bytes) points.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let sec1: Vec<u8> = match bytes.len() {
            COMPACT_PUBLIC_KEY_SIZE => {
                let mut point = Vec::with_capacity(SEC1_COMPRESSED_SIZE);
                point.push(SEC1_EVEN_Y);
                point.extend_from_slice(bytes);
                point
            }
            SEC1_COMPRESSED_SIZE | SEC1_UNCOMPRESSED_SIZE => bytes.to_vec(),
            len => {
                return Err(KeyError::validation(format!(
                    "unexpected public key length {}",
                    len
                )))
            }
        };

        guarded(|| p256::PublicKey::from_sec1_bytes(&sec1))
            .ok_or_else(|| KeyError::validation("panicked on public key check"))?
            .map(Self)
            .map_err(|_| KeyError::validation("public key is not a point on P-256"))
    }

    /// Whether the point's Y coordinate is even, i.e. the compact form is lossless.
    pub fn has_even_y(&self) -> bool {
        self.0.to_encoded_point(true).as_bytes()[0] == SEC1_EVEN_Y
    }

    /// The affine X coordinate, identical for a point and its negation.
    pub fn x_coordinate(&self) -> [u8; COMPACT_PUBLIC_KEY_SIZE] {
        let point = self.0.to_encoded_point(true);
        let mut x = [0u8; COMPACT_PUBLIC_KEY_SIZE];
        x.copy_from_slice(&point.as_bytes()[1..]);
        x
    }

    /// Encode for config files and the wire.
    ///
    /// Returns the 32-byte compact form when possible, otherwise the 33-byte
    /// SEC1 compressed point.
    pub fn to_bytes(&self) -> Vec<u8> {
        let point = self.0.to_encoded_point(true);
        let bytes = point.as_bytes();
        if bytes[0] == SEC1_EVEN_Y {
            bytes[1..].to_vec()
        } else {
            bytes.to_vec()
        }
    }

    /// Standard base64 of [`to_bytes`](Self::to_bytes).
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Lowercase hex of [`to_bytes`](Self::to_bytes).
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

/// A matched P-256 key pair whose public point has an even Y coordinate.
#[derive(Clone, Debug)]
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl KeyPair {
    /// The public half.
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// The private half.
    pub fn private(&self) -> &PrivateKey {
        &self.private
    }
}

/// The result of a P-256 Diffie-Hellman key exchange.
///
/// Zeroized on drop by the inner `p256` type.
pub struct SharedSecret(ecdh::SharedSecret);

impl SharedSecret {
    /// Get the raw shared secret bytes (the X coordinate of the shared point).
    ///
    /// # Security
    ///
    /// This should be fed into a KDF (like HKDF) before use as a key.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.raw_secret_bytes().as_slice()
    }
}

/// Draw a fresh key pair from the OS random source.
///
/// Scalars are redrawn until the public point has an even Y coordinate, so
/// the pair always round-trips through the compact public key encoding.
/// Fails only if the random source does.
pub fn generate_key_pair() -> Result<KeyPair, KeyError> {
    loop {
        let mut seed = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
        SecureRandom::try_fill(&mut seed[..])
            .map_err(|e| KeyError::Generation(e.to_string()))?;

        // Zero or out-of-range scalars are astronomically unlikely; just redraw.
        let Ok(secret) = p256::SecretKey::from_slice(&seed[..]) else {
            continue;
        };

        let private = PrivateKey(secret);
        let public = private.public_key();
        if public.has_even_y() {
            return Ok(KeyPair { public, private });
        }
    }
}

/// Check that `bytes` is a private key usable for key exchange on P-256.
///
/// Runs a trial agreement against a fresh ephemeral key. Never panics: any
/// fault inside the curve code is reported as `false`.
pub fn validate_private_key(bytes: &[u8]) -> bool {
    let Ok(private) = PrivateKey::from_bytes(bytes) else {
        return false;
    };

    guarded(|| {
        let ephemeral = EphemeralSecret::random(&mut SecureRandom::rng());
        let shared = ecdh::diffie_hellman(
            private.0.to_nonzero_scalar(),
            ephemeral.public_key().as_affine(),
        );
        shared.raw_secret_bytes().iter().any(|&b| b != 0)
    })
    .unwrap_or(false)
}

/// Check that `bytes` encodes a point on P-256.
pub fn validate_public_key(bytes: &[u8]) -> Result<(), KeyError> {
    PublicKey::from_bytes(bytes).map(|_| ())
}

/// Run curve code, turning an unwinding panic into `None`.
fn guarded<T>(f: impl FnOnce() -> T) -> Option<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_validate() {
        for _ in 0..16 {
            let pair = generate_key_pair().unwrap();
            assert!(validate_public_key(&pair.public().to_bytes()).is_ok());
            assert!(validate_private_key(pair.private().to_bytes().as_slice()));
        }
    }

    #[test]
    fn test_generated_public_key_is_compact() {
        let pair = generate_key_pair().unwrap();
        assert!(pair.public().has_even_y());
        assert_eq!(pair.public().to_bytes().len(), COMPACT_PUBLIC_KEY_SIZE);
        assert_eq!(pair.public().to_hex().len(), 64);
    }

    #[test]
    fn test_public_key_encodings() {
        let pair = generate_key_pair().unwrap();
        let compact = pair.public().to_bytes();
        let restored = PublicKey::from_bytes(&compact).unwrap();
        assert_eq!(&restored, pair.public());

        let uncompressed = pair.public().0.to_encoded_point(false);
        let restored = PublicKey::from_bytes(uncompressed.as_bytes()).unwrap();
        assert_eq!(&restored, pair.public());
    }

    #[test]
    fn test_x_coordinate_ignores_y_parity() {
        let odd = (1u8..=255)
            .map(|k| PrivateKey::from_bytes(&[k; 32]).unwrap().public_key())
            .find(|public| !public.has_even_y())
            .unwrap();
        assert_eq!(odd.to_bytes().len(), SEC1_COMPRESSED_SIZE);

        let compact = PublicKey::from_bytes(&odd.x_coordinate()).unwrap();
        assert!(compact.has_even_y());
        assert_ne!(compact, odd);
        assert_eq!(compact.x_coordinate(), odd.x_coordinate());
    }

    #[test]
    fn test_private_key_derives_public() {
        let pair = generate_key_pair().unwrap();
        let restored = PrivateKey::from_bytes(pair.private().to_bytes().as_slice()).unwrap();
        assert_eq!(&restored.public_key(), pair.public());
    }

    #[test]
    fn test_key_exchange() {
        let server = generate_key_pair().unwrap();
        let client = generate_key_pair().unwrap();

        let client_shared = client.private().diffie_hellman(server.public());
        let server_shared = server.private().diffie_hellman(client.public());

        assert_eq!(client_shared.as_bytes(), server_shared.as_bytes());
    }

    #[test]
    fn test_off_curve_point_rejected() {
        // (9, 100) is not on P-256.
        let mut point = [0u8; SEC1_UNCOMPRESSED_SIZE];
        point[0] = 0x04;
        point[32] = 9;
        point[64] = 100;

        let err = validate_public_key(&point).unwrap_err();
        assert!(matches!(err, KeyError::Validation(_)));
    }

    #[test]
    fn test_bad_public_key_lengths() {
        assert!(validate_public_key(&[]).is_err());
        assert!(validate_public_key(&[0x02; 31]).is_err());
        assert!(validate_public_key(&[0x04; 64]).is_err());
    }

    #[test]
    fn test_bad_private_keys() {
        assert!(!validate_private_key(&[]));
        assert!(!validate_private_key(&[0u8; 32]));
        assert!(!validate_private_key(&[0xff; 32]));
        assert!(!validate_private_key(&[1u8; 31]));
        assert!(!validate_private_key(&[1u8; 33]));
        assert!(validate_private_key(&[1u8; 32]));
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let pair = generate_key_pair().unwrap();
        let debug = format!("{:?}", pair.private());
        assert!(!debug.contains(&pair.private().to_hex()));
    }
}
