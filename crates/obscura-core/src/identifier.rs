//! Key identifiers
//!
//! A key identifier names one key inside a key store namespace. Identifiers
//! are either chosen by the caller or generated (random UUIDv4 strings).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum identifier length in bytes
pub const MAX_IDENTIFIER_LEN: usize = 256;

/// Rejected key identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid key identifier: {reason}")]
pub struct InvalidIdentifier {
    pub reason: String,
}

/// Name of a key inside a key store namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyIdentifier(String);

impl KeyIdentifier {
    /// Validate and wrap a caller-chosen identifier
    ///
    /// Identifiers must be non-empty, at most [`MAX_IDENTIFIER_LEN`] bytes,
    /// and free of control characters (the NUL byte separates namespaces in
    /// durable stores).
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidIdentifier> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidIdentifier {
                reason: "identifier is empty".to_string(),
            });
        }
        if id.len() > MAX_IDENTIFIER_LEN {
            return Err(InvalidIdentifier {
                reason: format!(
                    "identifier is {} bytes (max {})",
                    id.len(),
                    MAX_IDENTIFIER_LEN
                ),
            });
        }
        if id.chars().any(char::is_control) {
            return Err(InvalidIdentifier {
                reason: "identifier contains control characters".to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Short display form (first 8 chars)
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for KeyIdentifier {
    type Error = InvalidIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for KeyIdentifier {
    type Error = InvalidIdentifier;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeyIdentifier> for String {
    fn from(id: KeyIdentifier) -> Self {
        id.0
    }
}
