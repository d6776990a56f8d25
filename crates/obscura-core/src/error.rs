//! Error types shared across Obscura

use thiserror::Error;

/// Coarse classification of every failure Obscura can report
///
/// Callers use the kind to decide what to show: authentication failures
/// prompt the user to retry, cryptographic failures indicate corrupted or
/// tampered data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Plaintext or image serialization failed
    Conversion,
    /// Key store unavailable, duplicate identifier, missing key, I/O failure
    KeyStore,
    /// Seal failure, tag verification failure, malformed nonce or tag
    Cryptographic,
    /// Asset already revoked, or key destruction failed
    Revocation,
    /// Authentication gate refused or could not run
    Authentication,
    /// Operation was cancelled by the caller
    Cancelled,
    /// Unrecognized underlying failure
    Unknown,
}

impl ErrorKind {
    /// Human-readable label for UI display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Conversion => "conversion",
            Self::KeyStore => "key store",
            Self::Cryptographic => "cryptographic",
            Self::Revocation => "revocation",
            Self::Authentication => "authentication",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors converting between images and the byte buffers that get sealed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Plaintext is empty")]
    EmptyPlaintext,

    #[error("Image has a zero dimension ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },

    #[error("Malformed image data: {0}")]
    Malformed(String),
}

impl ConversionError {
    /// Create a new Malformed error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Conversion
    }
}

/// Failures reported by an [`AuthenticationGate`](crate::AuthenticationGate)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authentication is not available on this device")]
    Unavailable,

    #[error("No authentication factor is enrolled")]
    NotEnrolled,

    #[error("Authentication failed: {0}")]
    Failed(String),

    #[error("Authentication is locked out after too many attempts")]
    Lockout,

    #[error("Authentication was cancelled by the user")]
    UserCancelled,

    #[error("Authentication timed out")]
    Timeout,

    #[error("Unknown authentication error: {0}")]
    Unknown(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Authentication
    }

    /// Whether prompting again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::UserCancelled | Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_error_display() {
        let err = ConversionError::ZeroDimension {
            width: 0,
            height: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x10"));
        assert_eq!(err.kind(), ErrorKind::Conversion);

        let err = ConversionError::malformed("truncated");
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_auth_error_retryable() {
        assert!(AuthError::Failed("bad match".into()).is_retryable());
        assert!(AuthError::UserCancelled.is_retryable());
        assert!(!AuthError::Lockout.is_retryable());
        assert!(!AuthError::NotEnrolled.is_retryable());
        assert_eq!(AuthError::Lockout.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_error_kind_labels() {
        assert_eq!(ErrorKind::KeyStore.to_string(), "key store");
        assert_eq!(ErrorKind::Cryptographic.label(), "cryptographic");
    }
}
