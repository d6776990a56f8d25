//! Revocation by key destruction
//!
//! An asset moves from Active to Revoked exactly once. The key is destroyed
//! first, together with a revocation record in the store, and the flag is
//! flipped second. Every interruption leaves one of two safe states: nothing
//! changed, or the key is gone and the store refuses every copy of the
//! record with `AlreadyRevoked`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use uuid::Uuid;

use obscura_core::KeyIdentifier;
use obscura_keystore::{KeyLocks, KeyStore, KeyStoreError};
use obscura_logging::OperationContext;

use crate::asset::EncryptedAsset;
use crate::cipher::{CipherService, join_worker};
use crate::error::{CipherError, CipherResult};

/// Drives the Active -> Revoked transition
pub struct RevocationCoordinator<K: KeyStore> {
    store: Arc<K>,
    locks: Arc<KeyLocks>,
}

impl<K: KeyStore> Clone for RevocationCoordinator<K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<K: KeyStore> RevocationCoordinator<K> {
    /// Create a coordinator with its own lock table
    pub fn new(store: Arc<K>) -> Self {
        Self::with_locks(store, Arc::new(KeyLocks::new()))
    }

    pub fn with_locks(store: Arc<K>, locks: Arc<KeyLocks>) -> Self {
        Self { store, locks }
    }

    /// Coordinator sharing a cipher service's store and lock table
    pub fn for_cipher(cipher: &CipherService<K>) -> Self {
        Self::with_locks(cipher.store().clone(), cipher.locks().clone())
    }

    /// Destroy the asset's key, then mark it revoked
    ///
    /// If key destruction fails the asset stays Active and `RevokeFailed` is
    /// returned. Revoking twice, or revoking a stale copy of an asset that was
    /// already revoked, is an error and never a silent no-op.
    #[instrument(skip(self, asset), fields(asset_id = %asset.id(), key_id = %asset.key_identifier()))]
    pub fn revoke(&self, asset: &mut EncryptedAsset) -> CipherResult<()> {
        if asset.is_revoked() {
            return Err(CipherError::AlreadyRevoked(asset.id()));
        }

        let id = asset.key_identifier().clone();
        let asset_id = asset.id();
        self.locks.with_lock(&id, || self.destroy_key(&id, asset_id))?;

        asset.mark_revoked()?;
        warn!("Asset revoked");
        Ok(())
    }

    /// Revoke a copy, leaving `asset` untouched
    pub fn revoked(&self, asset: &EncryptedAsset) -> CipherResult<EncryptedAsset> {
        let mut copy = asset.clone();
        self.revoke(&mut copy)?;
        Ok(copy)
    }

    /// Destroy every key in the store's namespace
    ///
    /// No revocation records are written, since the coordinator does not know
    /// which assets used these keys. Their records fail with `KeyNotFound`.
    #[instrument(skip(self), fields(namespace = %self.store.namespace()))]
    pub fn revoke_all(&self) -> CipherResult<()> {
        self.store
            .delete_all_keys()
            .map_err(CipherError::RevokeFailed)?;
        warn!("All keys in namespace destroyed");
        Ok(())
    }

    /// Caller holds the lock for `id`
    fn destroy_key(&self, id: &KeyIdentifier, asset_id: Uuid) -> CipherResult<()> {
        let fail = |e: KeyStoreError| {
            warn!(key_id = %id, error = %e, "Key destruction failed, asset remains active");
            CipherError::RevokeFailed(e)
        };

        if self.store.is_asset_revoked(asset_id).map_err(fail)? {
            return Err(CipherError::AlreadyRevoked(asset_id));
        }
        self.store.revoke_asset(id, asset_id).map_err(fail)
    }
}

impl<K: KeyStore + 'static> RevocationCoordinator<K> {
    /// [`revoke`](Self::revoke) with key destruction on the blocking pool
    ///
    /// Cancellation observed before the key is destroyed aborts with no
    /// change. Once the key is gone the flag is always flipped and the call
    /// succeeds.
    pub async fn revoke_async(
        &self,
        asset: &mut EncryptedAsset,
        cancel: CancellationToken,
    ) -> CipherResult<()> {
        if asset.is_revoked() {
            return Err(CipherError::AlreadyRevoked(asset.id()));
        }
        if cancel.is_cancelled() {
            return Err(CipherError::Cancelled);
        }

        let id = asset.key_identifier().clone();
        let asset_id = asset.id();
        let span = OperationContext::new("revoke")
            .with_asset(asset_id)
            .with_key(id.as_str())
            .span();

        let coordinator = self.clone();
        let worker_cancel = cancel.child_token();
        let guard = worker_cancel.clone().drop_guard();

        let handle = tokio::task::spawn_blocking(move || {
            span.in_scope(|| {
                coordinator.locks.with_lock(&id, || {
                    if worker_cancel.is_cancelled() {
                        return Err(CipherError::Cancelled);
                    }
                    coordinator.destroy_key(&id, asset_id)
                })
            })
        });

        let result = join_worker(handle.await, "revoke");
        guard.disarm();
        result?;

        asset.mark_revoked()?;
        warn!(asset_id = %asset.id(), "Asset revoked");
        Ok(())
    }
}
