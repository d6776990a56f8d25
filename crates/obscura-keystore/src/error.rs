//! Error types for obscura-keystore

use obscura_core::{ErrorKind, InvalidIdentifier};
use thiserror::Error;

/// Errors that can occur in key store operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyStoreError {
    /// The backing store could not be reached
    #[error("Key store unavailable: {0}")]
    Unavailable(String),

    /// The backing store did not answer in time
    #[error("Key store timed out: {0}")]
    Timeout(String),

    /// A key is already stored under this identifier
    #[error("Duplicate key identifier: {0}")]
    DuplicateIdentifier(String),

    /// No key is stored under this identifier
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The identifier was rejected
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),

    /// Reading key material failed
    #[error("Key read failed: {0}")]
    Read(String),

    /// Writing key material failed
    #[error("Key write failed: {0}")]
    Write(String),

    /// Destroying key material failed
    #[error("Key delete failed: {0}")]
    Delete(String),

    /// Stored key material has the wrong length
    #[error("Stored key is corrupted: expected {expected} bytes, got {actual}")]
    Corrupted { expected: usize, actual: usize },

    /// Unrecognized backend failure
    #[error("Unknown key store error: {0}")]
    Unknown(String),
}

impl KeyStoreError {
    /// Create a new Unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a new NotFound error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create a new Read error
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    /// Create a new Write error
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write(message.into())
    }

    /// Create a new Delete error
    pub fn delete(message: impl Into<String>) -> Self {
        Self::Delete(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unknown(_) => ErrorKind::Unknown,
            _ => ErrorKind::KeyStore,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_core::KeyIdentifier;

    #[test]
    fn test_not_found_error() {
        let err = KeyStoreError::not_found("k1");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("k1"));
        assert_eq!(err.kind(), ErrorKind::KeyStore);
    }

    #[test]
    fn test_timeout_is_distinct() {
        let err = KeyStoreError::Timeout("enclave busy".into());
        assert!(err.is_timeout());
        assert!(!KeyStoreError::unavailable("down").is_timeout());
    }

    #[test]
    fn test_invalid_identifier_conversion() {
        let invalid = KeyIdentifier::new("").unwrap_err();
        let err: KeyStoreError = invalid.into();
        assert!(matches!(err, KeyStoreError::InvalidIdentifier(_)));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_unknown_kind() {
        let err = KeyStoreError::Unknown("status -34018".into());
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.to_string().contains("-34018"));
    }
}
