//! The encrypted asset record and its JSON wire format
//!
//! ```json
//! {
//!   "id": "5f0c...",
//!   "ciphertext": "<base64>",
//!   "iv": "<base64, 12 bytes>",
//!   "tag": "<base64, 16 bytes>",
//!   "keyIdentifier": "photo-1",
//!   "timestamp": "2024-05-01T12:00:00Z",
//!   "dimensions": { "width": 100, "height": 100 },
//!   "isRevoked": false
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use obscura_core::{Dimensions, KeyIdentifier};

use crate::error::CipherError;

/// Nonce size for ChaCha20-Poly1305 (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for ChaCha20-Poly1305 (128 bits)
pub const TAG_SIZE: usize = 16;

/// Lifecycle of an asset; the only transition is Active -> Revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetState {
    Active,
    Revoked,
}

/// Sealed image plus the metadata needed to open it
///
/// Fields are read-only from outside this crate. The revocation flag in
/// particular can only be set by [`RevocationCoordinator`](crate::RevocationCoordinator),
/// and only after the key has been destroyed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedAsset {
    id: Uuid,
    #[serde(with = "base64_bytes")]
    ciphertext: Vec<u8>,
    #[serde(rename = "iv", with = "base64_bytes")]
    nonce: Vec<u8>,
    #[serde(with = "base64_bytes")]
    tag: Vec<u8>,
    key_identifier: KeyIdentifier,
    timestamp: DateTime<Utc>,
    dimensions: Dimensions,
    is_revoked: bool,
}

/// Every field of an [`EncryptedAsset`], for storage adapters and tests
///
/// Rebuilding an asset from parts bypasses no security property: a forged
/// `is_revoked = false` still cannot be opened once the key is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetParts {
    pub id: Uuid,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub tag: Vec<u8>,
    pub key_identifier: KeyIdentifier,
    pub timestamp: DateTime<Utc>,
    pub dimensions: Dimensions,
    pub is_revoked: bool,
}

impl EncryptedAsset {
    /// Record a fresh seal
    pub(crate) fn sealed(
        ciphertext: Vec<u8>,
        nonce: [u8; NONCE_SIZE],
        tag: [u8; TAG_SIZE],
        key_identifier: KeyIdentifier,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ciphertext,
            nonce: nonce.to_vec(),
            tag: tag.to_vec(),
            key_identifier,
            timestamp: Utc::now(),
            dimensions,
            is_revoked: false,
        }
    }

    pub fn from_parts(parts: AssetParts) -> Self {
        Self {
            id: parts.id,
            ciphertext: parts.ciphertext,
            nonce: parts.nonce,
            tag: parts.tag,
            key_identifier: parts.key_identifier,
            timestamp: parts.timestamp,
            dimensions: parts.dimensions,
            is_revoked: parts.is_revoked,
        }
    }

    pub fn into_parts(self) -> AssetParts {
        AssetParts {
            id: self.id,
            ciphertext: self.ciphertext,
            nonce: self.nonce,
            tag: self.tag,
            key_identifier: self.key_identifier,
            timestamp: self.timestamp,
            dimensions: self.dimensions,
            is_revoked: self.is_revoked,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    pub fn key_identifier(&self) -> &KeyIdentifier {
        &self.key_identifier
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn is_revoked(&self) -> bool {
        self.is_revoked
    }

    pub fn state(&self) -> AssetState {
        if self.is_revoked {
            AssetState::Revoked
        } else {
            AssetState::Active
        }
    }

    /// Flip the revocation flag; refuses a second flip
    pub(crate) fn mark_revoked(&mut self) -> Result<(), CipherError> {
        if self.is_revoked {
            return Err(CipherError::AlreadyRevoked(self.id));
        }
        self.is_revoked = true;
        Ok(())
    }

    /// Nonce as a fixed-size array, or `MalformedNonce`
    pub(crate) fn nonce_array(&self) -> Result<[u8; NONCE_SIZE], CipherError> {
        self.nonce
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::MalformedNonce {
                expected: NONCE_SIZE,
                actual: self.nonce.len(),
            })
    }

    /// Tag as a fixed-size array, or `MalformedTag`
    pub(crate) fn tag_array(&self) -> Result<[u8; TAG_SIZE], CipherError> {
        self.tag
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::MalformedTag {
                expected: TAG_SIZE,
                actual: self.tag.len(),
            })
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> Result<String, CipherError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON
    pub fn to_json_pretty(&self) -> Result<String, CipherError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, CipherError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl std::fmt::Debug for EncryptedAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedAsset")
            .field("id", &self.id)
            .field("ciphertext_len", &self.ciphertext.len())
            .field("key_identifier", &self.key_identifier)
            .field("timestamp", &self.timestamp)
            .field("dimensions", &self.dimensions)
            .field("is_revoked", &self.is_revoked)
            .finish()
    }
}

/// Standard base64 (with padding) for byte fields
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
