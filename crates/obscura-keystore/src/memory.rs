//! In-memory key store
//!
//! Keeps keys in a process-local map. Intended for tests and simulations;
//! keys vanish when the store is dropped.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use obscura_core::KeyIdentifier;

use crate::KeyStore;
use crate::error::KeyStoreError;
use crate::key::SymmetricKey;

/// In-memory implementation of [`KeyStore`]
///
/// Supports failure injection: while marked unavailable, every fallible
/// operation returns `Unavailable` and `key_exists` reports `false`.
pub struct InMemoryKeyStore {
    namespace: String,
    keys: RwLock<HashMap<KeyIdentifier, SymmetricKey>>,
    revoked: RwLock<HashSet<Uuid>>,
    available: AtomicBool,
}

impl InMemoryKeyStore {
    /// Create an empty store for `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            keys: RwLock::new(HashMap::new()),
            revoked: RwLock::new(HashSet::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backing store going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    fn ensure_available(&self) -> Result<(), KeyStoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(KeyStoreError::unavailable(format!(
                "in-memory store '{}' is offline",
                self.namespace
            )))
        }
    }
}

impl Default for InMemoryKeyStore {
    fn default() -> Self {
        Self::new("default")
    }
}

impl KeyStore for InMemoryKeyStore {
    fn generate_key(&self, id: &KeyIdentifier) -> Result<SymmetricKey, KeyStoreError> {
        self.ensure_available()?;

        let mut keys = self.keys.write();
        if keys.contains_key(id) {
            return Err(KeyStoreError::DuplicateIdentifier(id.to_string()));
        }

        let key = SymmetricKey::generate();
        keys.insert(id.clone(), key.clone());
        info!(namespace = %self.namespace, key_id = %id, "Generated key");
        Ok(key)
    }

    fn retrieve_key(&self, id: &KeyIdentifier) -> Result<SymmetricKey, KeyStoreError> {
        self.ensure_available()?;

        self.keys
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| KeyStoreError::not_found(id.as_str()))
    }

    fn delete_key(&self, id: &KeyIdentifier) -> Result<(), KeyStoreError> {
        self.ensure_available()?;

        if self.keys.write().remove(id).is_some() {
            warn!(namespace = %self.namespace, key_id = %id, "Destroyed key");
        } else {
            debug!(namespace = %self.namespace, key_id = %id, "No key to delete");
        }
        Ok(())
    }

    fn key_exists(&self, id: &KeyIdentifier) -> bool {
        self.ensure_available().is_ok() && self.keys.read().contains_key(id)
    }

    fn delete_all_keys(&self) -> Result<(), KeyStoreError> {
        self.ensure_available()?;

        let mut keys = self.keys.write();
        let count = keys.len();
        keys.clear();
        warn!(namespace = %self.namespace, count, "Destroyed all keys");
        Ok(())
    }

    fn revoke_asset(&self, id: &KeyIdentifier, asset_id: Uuid) -> Result<(), KeyStoreError> {
        self.ensure_available()?;

        // Lock order: keys, then revoked
        let mut keys = self.keys.write();
        let mut revoked = self.revoked.write();
        let destroyed = keys.remove(id).is_some();
        revoked.insert(asset_id);

        warn!(namespace = %self.namespace, key_id = %id, %asset_id, destroyed, "Revoked asset key");
        Ok(())
    }

    fn is_asset_revoked(&self, asset_id: Uuid) -> Result<bool, KeyStoreError> {
        self.ensure_available()?;
        Ok(self.revoked.read().contains(&asset_id))
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}
