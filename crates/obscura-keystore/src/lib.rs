//! # Obscura Keystore
//!
//! Storage for per-asset symmetric keys.
//!
//! Every protected asset is sealed under its own 256-bit key. Destroying that
//! key is what makes the asset permanently unreadable, so the store's
//! contract around deletion matters more than anything else here.
//!
//! ## Features
//!
//! - **KeyStore trait**: identifier-indexed generate/retrieve/delete/exists
//! - **InMemoryKeyStore**: In-memory implementation for tests, with failure injection
//! - **RedbKeyStore**: Durable file-backed implementation on redb
//! - **KeyLocks**: Per-identifier mutual exclusion for multi-step operations
//! - **Revocation records**: asset ids whose key was destroyed by revocation,
//!   kept beside the keys so every copy of a revoked record is refused
//!
//! ## Example
//!
//! ```rust,ignore
//! use obscura_core::KeyIdentifier;
//! use obscura_keystore::{InMemoryKeyStore, KeyStore};
//!
//! let store = InMemoryKeyStore::new("photos");
//! let id = KeyIdentifier::new("k1").unwrap();
//!
//! let key = store.generate_key(&id).unwrap();
//! assert_eq!(store.retrieve_key(&id).unwrap(), key);
//!
//! // Destroying the key is permanent
//! store.delete_key(&id).unwrap();
//! assert!(!store.key_exists(&id));
//! ```

pub mod error;
pub mod key;
pub mod locks;
pub mod memory;
pub mod redb_store;

// Re-exports
pub use error::KeyStoreError;
pub use key::{KEY_SIZE, SymmetricKey};
pub use locks::KeyLocks;
pub use memory::InMemoryKeyStore;
pub use redb_store::{RedbKeyStore, RedbKeyStoreConfig};

use std::sync::Arc;

use obscura_core::{InvalidIdentifier, KeyIdentifier, MAX_IDENTIFIER_LEN};
use uuid::Uuid;

/// Durable, identifier-indexed storage for symmetric key material
///
/// All operations are synchronous and may block on I/O. Calls for different
/// identifiers must not interfere with each other; calls for the same
/// identifier must be linearizable, so that once `delete_key` returns no
/// later `retrieve_key` can observe the key.
pub trait KeyStore: Send + Sync {
    /// Create and store a fresh random key under `id`
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentifier` if a key already exists under `id`
    /// (existing keys are never overwritten), or `Unavailable` if the backing
    /// store cannot be reached.
    fn generate_key(&self, id: &KeyIdentifier) -> Result<SymmetricKey, KeyStoreError>;

    /// Read the key stored under `id`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no key is stored under `id`.
    fn retrieve_key(&self, id: &KeyIdentifier) -> Result<SymmetricKey, KeyStoreError>;

    /// Permanently destroy the key stored under `id`
    ///
    /// Deleting an absent key succeeds. Backend failures are reported.
    fn delete_key(&self, id: &KeyIdentifier) -> Result<(), KeyStoreError>;

    /// Whether a key is stored under `id`
    ///
    /// Never fails: an unreachable backend reports `false`, the same as an
    /// absent key.
    fn key_exists(&self, id: &KeyIdentifier) -> bool;

    /// Destroy every key in this store's namespace
    ///
    /// Revocation records are kept.
    fn delete_all_keys(&self) -> Result<(), KeyStoreError>;

    /// Destroy the key under `id` and record `asset_id` as revoked
    ///
    /// Both changes land together or not at all. An absent key is not an
    /// error; the revocation is still recorded.
    fn revoke_asset(&self, id: &KeyIdentifier, asset_id: Uuid) -> Result<(), KeyStoreError>;

    /// Whether `asset_id` was recorded by [`revoke_asset`](Self::revoke_asset)
    fn is_asset_revoked(&self, asset_id: Uuid) -> Result<bool, KeyStoreError>;

    /// Namespace isolating this store's keys from other stores on the same backend
    fn namespace(&self) -> &str;
}

impl<K: KeyStore + ?Sized> KeyStore for Arc<K> {
    fn generate_key(&self, id: &KeyIdentifier) -> Result<SymmetricKey, KeyStoreError> {
        (**self).generate_key(id)
    }

    fn retrieve_key(&self, id: &KeyIdentifier) -> Result<SymmetricKey, KeyStoreError> {
        (**self).retrieve_key(id)
    }

    fn delete_key(&self, id: &KeyIdentifier) -> Result<(), KeyStoreError> {
        (**self).delete_key(id)
    }

    fn key_exists(&self, id: &KeyIdentifier) -> bool {
        (**self).key_exists(id)
    }

    fn delete_all_keys(&self) -> Result<(), KeyStoreError> {
        (**self).delete_all_keys()
    }

    fn revoke_asset(&self, id: &KeyIdentifier, asset_id: Uuid) -> Result<(), KeyStoreError> {
        (**self).revoke_asset(id, asset_id)
    }

    fn is_asset_revoked(&self, asset_id: Uuid) -> Result<bool, KeyStoreError> {
        (**self).is_asset_revoked(asset_id)
    }

    fn namespace(&self) -> &str {
        (**self).namespace()
    }
}

impl<K: KeyStore + ?Sized> KeyStore for Box<K> {
    fn generate_key(&self, id: &KeyIdentifier) -> Result<SymmetricKey, KeyStoreError> {
        (**self).generate_key(id)
    }

    fn retrieve_key(&self, id: &KeyIdentifier) -> Result<SymmetricKey, KeyStoreError> {
        (**self).retrieve_key(id)
    }

    fn delete_key(&self, id: &KeyIdentifier) -> Result<(), KeyStoreError> {
        (**self).delete_key(id)
    }

    fn key_exists(&self, id: &KeyIdentifier) -> bool {
        (**self).key_exists(id)
    }

    fn delete_all_keys(&self) -> Result<(), KeyStoreError> {
        (**self).delete_all_keys()
    }

    fn revoke_asset(&self, id: &KeyIdentifier, asset_id: Uuid) -> Result<(), KeyStoreError> {
        (**self).revoke_asset(id, asset_id)
    }

    fn is_asset_revoked(&self, asset_id: Uuid) -> Result<bool, KeyStoreError> {
        (**self).is_asset_revoked(asset_id)
    }

    fn namespace(&self) -> &str {
        (**self).namespace()
    }
}

/// Check a namespace name
///
/// Durable stores prefix every entry with `namespace \0`, so a namespace
/// holding a NUL would overlap another namespace's prefix. The rules match
/// [`KeyIdentifier::new`].
pub fn validate_namespace(namespace: &str) -> Result<(), KeyStoreError> {
    let reason = if namespace.is_empty() {
        "namespace is empty".to_string()
    } else if namespace.len() > MAX_IDENTIFIER_LEN {
        format!(
            "namespace is {} bytes (max {})",
            namespace.len(),
            MAX_IDENTIFIER_LEN
        )
    } else if namespace.chars().any(char::is_control) {
        "namespace contains control characters".to_string()
    } else {
        return Ok(());
    };
    Err(InvalidIdentifier { reason }.into())
}
