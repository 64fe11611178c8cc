//! Secure random number generation.
//!
//! Provides cryptographically secure random bytes using the operating
//! system's entropy source.

use rand::{CryptoRng, RngCore};
use rand_core::OsRng;

/// Cryptographically secure random number generator.
///
/// Wraps the OS-provided entropy source (e.g., getrandom(2) on Linux,
/// BCryptGenRandom on Windows).
pub struct SecureRandom;

impl SecureRandom {
    /// Fill a buffer, reporting entropy-source failure instead of panicking.
    pub fn try_fill(dest: &mut [u8]) -> Result<(), rand_core::Error> {
        OsRng.try_fill_bytes(dest)
    }

    /// Get an RNG instance that implements CryptoRng.
    pub fn rng() -> impl RngCore + CryptoRng {
        OsRng
    }
}
