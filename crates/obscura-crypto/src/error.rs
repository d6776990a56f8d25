//! Error types for obscura-crypto

use obscura_core::{AuthError, ConversionError, ErrorKind};
use obscura_keystore::KeyStoreError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while sealing, opening or revoking assets
#[derive(Debug, Error)]
pub enum CipherError {
    /// Plaintext was empty, or the image had a zero dimension
    #[error("Plaintext conversion failed: {0}")]
    PlaintextConversionFailed(#[from] ConversionError),

    /// The key store could not produce a key
    #[error("Key unavailable: {0}")]
    KeyUnavailable(#[source] KeyStoreError),

    /// The asset's key is gone (revoked elsewhere, or never existed)
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Seal failed: {0}")]
    SealFailed(String),

    #[error("Malformed nonce: expected {expected} bytes, got {actual}")]
    MalformedNonce { expected: usize, actual: usize },

    #[error("Malformed tag: expected {expected} bytes, got {actual}")]
    MalformedTag { expected: usize, actual: usize },

    /// Tag verification failed: wrong key, or tampered ciphertext/nonce/tag
    #[error("Authentication tag verification failed")]
    AuthenticationFailed,

    #[error("Asset {0} is already revoked")]
    AlreadyRevoked(Uuid),

    /// Key destruction failed; the asset is still active
    #[error("Revocation failed: {0}")]
    RevokeFailed(#[source] KeyStoreError),

    /// The local authentication gate refused or could not run
    #[error("User authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("Operation cancelled")]
    Cancelled,

    /// Asset record could not be encoded or decoded
    #[error("Asset serialization failed: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl CipherError {
    /// Create a new SealFailed error
    pub fn seal_failed(message: impl Into<String>) -> Self {
        Self::SealFailed(message.into())
    }

    /// Create a new Unknown error
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PlaintextConversionFailed(_) | Self::Serialization(_) => ErrorKind::Conversion,
            Self::KeyUnavailable(_) | Self::KeyNotFound(_) => ErrorKind::KeyStore,
            Self::SealFailed(_)
            | Self::MalformedNonce { .. }
            | Self::MalformedTag { .. }
            | Self::AuthenticationFailed => ErrorKind::Cryptographic,
            Self::AlreadyRevoked(_) | Self::RevokeFailed(_) => ErrorKind::Revocation,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Whether the user should be asked to authenticate again
    ///
    /// Distinguishes a refused gate from tag verification failure, which
    /// means corrupted or tampered data.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Whether a backend or gate timed out
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::KeyUnavailable(e) | Self::RevokeFailed(e) => e.is_timeout(),
            Self::Authentication(e) => matches!(e, AuthError::Timeout),
            _ => false,
        }
    }

    /// Whether the asset can never be decrypted again
    pub fn is_permanent_loss(&self) -> bool {
        matches!(self, Self::AlreadyRevoked(_) | Self::KeyNotFound(_))
    }
}

impl From<serde_json::Error> for CipherError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for cipher operations
pub type CipherResult<T> = Result<T, CipherError>;
