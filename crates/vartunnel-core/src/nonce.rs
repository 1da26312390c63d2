//! Per-server secret embedded in the tunnel URL.
//!
//! The nonce is the only access control the tunnel has, so it is drawn from
//! the OS RNG, compared in constant time, kept out of `Debug` output, and
//! wiped from memory on drop.

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of random bytes in a nonce (hex-encoded to twice as many chars).
pub const NONCE_BYTES: usize = 20;

/// A hex-encoded random token.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Nonce(String);

impl Nonce {
    /// Generate a fresh nonce from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let nonce = Self(hex::encode(bytes));
        bytes.zeroize();
        nonce
    }

    /// The hex string, as it appears in the URL.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `presented` equals this nonce.
    ///
    /// Runs in time independent of where the first mismatching byte is.
    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();
        if expected.len() != presented.len() {
            return false;
        }
        expected
            .iter()
            .zip(presented)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce([REDACTED])")
    }
}
