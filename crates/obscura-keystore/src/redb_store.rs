//! Durable key store on redb
//!
//! Keys live in a single table keyed by `namespace \0 identifier`, so several
//! namespaces can share one database file. Revocation records use a second
//! table keyed by `namespace \0 asset uuid`. Every mutation is one redb write
//! transaction; redb serializes writers, which makes generate-if-absent and
//! delete linearizable with respect to reads of the same identifier.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use obscura_core::KeyIdentifier;

use crate::{KeyStore, validate_namespace};
use crate::error::KeyStoreError;
use crate::key::SymmetricKey;

// Key: namespace bytes || 0x00 || identifier bytes, Value: 32 bytes of key material
const KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("symmetric_keys");

// Key: namespace bytes || 0x00 || asset uuid bytes, Value: revocation time (unix seconds)
const REVOKED: TableDefinition<&[u8], u64> = TableDefinition::new("revoked_assets");

/// Configuration for the redb key store
#[derive(Debug, Clone)]
pub struct RedbKeyStoreConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Namespace isolating this store's keys
    pub namespace: String,
}

impl Default for RedbKeyStoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/obscura-keys.redb"),
            namespace: "default".to_string(),
        }
    }
}

/// Durable implementation of [`KeyStore`]
pub struct RedbKeyStore {
    db: Arc<Database>,
    namespace: String,
}

impl RedbKeyStore {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display(), namespace = %config.namespace))]
    pub fn open(config: RedbKeyStoreConfig) -> Result<Self, KeyStoreError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| KeyStoreError::unavailable(e.to_string()))?;
        }

        let db = Database::create(&config.db_path)
            .map_err(|e| KeyStoreError::unavailable(e.to_string()))?;

        info!("Opened redb key store");
        Self::with_database(Arc::new(db), config.namespace)
    }

    /// Use an already-open database, sharing it with other namespaces
    ///
    /// The namespace must pass [`validate_namespace`].
    pub fn with_database(
        db: Arc<Database>,
        namespace: impl Into<String>,
    ) -> Result<Self, KeyStoreError> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;

        let store = Self { db, namespace };
        store.init_tables()?;
        Ok(store)
    }

    /// Get a handle to the underlying database
    pub fn database(&self) -> Arc<Database> {
        self.db.clone()
    }

    fn init_tables(&self) -> Result<(), KeyStoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KeyStoreError::unavailable(e.to_string()))?;

        write_txn
            .open_table(KEYS)
            .map_err(|e| KeyStoreError::write(e.to_string()))?;
        write_txn
            .open_table(REVOKED)
            .map_err(|e| KeyStoreError::write(e.to_string()))?;

        write_txn
            .commit()
            .map_err(|e| KeyStoreError::write(e.to_string()))?;

        debug!("Initialized redb key tables");
        Ok(())
    }

    fn storage_key(&self, id: &KeyIdentifier) -> Vec<u8> {
        let mut key = namespace_prefix(&self.namespace);
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn revocation_key(&self, asset_id: Uuid) -> Vec<u8> {
        let mut key = namespace_prefix(&self.namespace);
        key.extend_from_slice(asset_id.as_bytes());
        key
    }
}

impl KeyStore for RedbKeyStore {
    #[instrument(skip(self), fields(namespace = %self.namespace, key_id = %id))]
    fn generate_key(&self, id: &KeyIdentifier) -> Result<SymmetricKey, KeyStoreError> {
        let storage_key = self.storage_key(id);

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KeyStoreError::unavailable(e.to_string()))?;

        let key = {
            let mut table = write_txn
                .open_table(KEYS)
                .map_err(|e| KeyStoreError::write(e.to_string()))?;

            let occupied = table
                .get(storage_key.as_slice())
                .map_err(|e| KeyStoreError::read(e.to_string()))?
                .is_some();
            if occupied {
                // Dropping the uncommitted transaction aborts it
                return Err(KeyStoreError::DuplicateIdentifier(id.to_string()));
            }

            let key = SymmetricKey::generate();
            table
                .insert(storage_key.as_slice(), key.as_bytes().as_slice())
                .map_err(|e| KeyStoreError::write(e.to_string()))?;
            key
        };

        write_txn
            .commit()
            .map_err(|e| KeyStoreError::write(e.to_string()))?;

        info!("Generated key");
        Ok(key)
    }

    fn retrieve_key(&self, id: &KeyIdentifier) -> Result<SymmetricKey, KeyStoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KeyStoreError::unavailable(e.to_string()))?;

        let table = read_txn
            .open_table(KEYS)
            .map_err(|e| KeyStoreError::read(e.to_string()))?;

        let value = table
            .get(self.storage_key(id).as_slice())
            .map_err(|e| KeyStoreError::read(e.to_string()))?
            .ok_or_else(|| KeyStoreError::not_found(id.as_str()))?;

        SymmetricKey::from_slice(value.value())
    }

    #[instrument(skip(self), fields(namespace = %self.namespace, key_id = %id))]
    fn delete_key(&self, id: &KeyIdentifier) -> Result<(), KeyStoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KeyStoreError::unavailable(e.to_string()))?;

        let removed = {
            let mut table = write_txn
                .open_table(KEYS)
                .map_err(|e| KeyStoreError::delete(e.to_string()))?;
            table
                .remove(self.storage_key(id).as_slice())
                .map_err(|e| KeyStoreError::delete(e.to_string()))?
                .is_some()
        };

        write_txn
            .commit()
            .map_err(|e| KeyStoreError::delete(e.to_string()))?;

        if removed {
            warn!("Destroyed key");
        } else {
            debug!("No key to delete");
        }
        Ok(())
    }

    fn key_exists(&self, id: &KeyIdentifier) -> bool {
        match self.retrieve_key(id) {
            Ok(_) => true,
            Err(KeyStoreError::NotFound(_)) => false,
            Err(e) => {
                debug!(key_id = %id, error = %e, "Key lookup failed, reporting absent");
                false
            }
        }
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    fn delete_all_keys(&self) -> Result<(), KeyStoreError> {
        let prefix = namespace_prefix(&self.namespace);

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KeyStoreError::unavailable(e.to_string()))?;

        let count = {
            let mut table = write_txn
                .open_table(KEYS)
                .map_err(|e| KeyStoreError::delete(e.to_string()))?;

            let mut doomed = Vec::new();
            {
                let range = table
                    .range(prefix.as_slice()..)
                    .map_err(|e| KeyStoreError::read(e.to_string()))?;

                for entry in range {
                    let (key, _value) = entry.map_err(|e| KeyStoreError::read(e.to_string()))?;
                    let key_bytes = key.value();

                    // Stop when we're past the namespace
                    if !key_bytes.starts_with(&prefix) {
                        break;
                    }
                    doomed.push(key_bytes.to_vec());
                }
            }

            for key in &doomed {
                table
                    .remove(key.as_slice())
                    .map_err(|e| KeyStoreError::delete(e.to_string()))?;
            }
            doomed.len()
        };

        write_txn
            .commit()
            .map_err(|e| KeyStoreError::delete(e.to_string()))?;

        warn!(count, "Destroyed all keys");
        Ok(())
    }

    #[instrument(skip(self), fields(namespace = %self.namespace, key_id = %id, %asset_id))]
    fn revoke_asset(&self, id: &KeyIdentifier, asset_id: Uuid) -> Result<(), KeyStoreError> {
        let revoked_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KeyStoreError::unavailable(e.to_string()))?;

        let destroyed = {
            let mut keys = write_txn
                .open_table(KEYS)
                .map_err(|e| KeyStoreError::delete(e.to_string()))?;
            let destroyed = keys
                .remove(self.storage_key(id).as_slice())
                .map_err(|e| KeyStoreError::delete(e.to_string()))?
                .is_some();

            let mut revoked = write_txn
                .open_table(REVOKED)
                .map_err(|e| KeyStoreError::write(e.to_string()))?;
            revoked
                .insert(self.revocation_key(asset_id).as_slice(), revoked_at)
                .map_err(|e| KeyStoreError::write(e.to_string()))?;
            destroyed
        };

        write_txn
            .commit()
            .map_err(|e| KeyStoreError::delete(e.to_string()))?;

        warn!(destroyed, "Revoked asset key");
        Ok(())
    }

    fn is_asset_revoked(&self, asset_id: Uuid) -> Result<bool, KeyStoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KeyStoreError::unavailable(e.to_string()))?;

        let table = read_txn
            .open_table(REVOKED)
            .map_err(|e| KeyStoreError::read(e.to_string()))?;

        Ok(table
            .get(self.revocation_key(asset_id).as_slice())
            .map_err(|e| KeyStoreError::read(e.to_string()))?
            .is_some())
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Byte prefix shared by every key in one namespace
fn namespace_prefix(namespace: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(namespace.len() + 1);
    bytes.extend_from_slice(namespace.as_bytes());
    bytes.push(0);
    bytes
}
