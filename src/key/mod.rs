//! Raw key material and fingerprints

pub mod cache;

use crate::crypto::random_bytes;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Raw symmetric key bytes, wiped on drop and never printed
#[derive(Clone)]
pub struct SecretKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"<hidden>")
            .finish()
    }
}

impl SecretKey {
    /// Takes ownership of raw key bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Generates a random key of the given size
    pub fn generate(size: usize) -> Self {
        Self::new(random_bytes(size))
    }

    /// Borrows the raw bytes
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-length key
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// One-way fingerprint of this key
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.bytes)
    }
}

impl From<Vec<u8>> for SecretKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for SecretKey {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

/// Pass-phrase style keys are used byte for byte, so a 32 character string is an AES-256 key
impl From<&str> for SecretKey {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

/// Lowercase hex SHA-256 of the input
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Constant-time comparison of two fingerprints
pub fn fingerprints_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
