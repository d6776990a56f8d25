//! Symmetric key material

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::KeyStoreError;

/// Key size (32 bytes, 256 bits)
pub const KEY_SIZE: usize = 32;

/// 256-bit symmetric key, wiped from memory on drop
///
/// Key material is never serialized and never printed. Holders outside the
/// key store should keep it only for the duration of one operation.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Generate a new random key
    ///
    /// Uses the thread-local CSPRNG, seeded from the operating system.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut key);
        Self(key)
    }

    /// Create from raw key bytes
    pub fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Create from a stored value, checking its length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyStoreError> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| KeyStoreError::Corrupted {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(key))
    }

    /// Get the raw key bytes (use with caution)
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Eq for SymmetricKey {}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}
