//! Sealing and opening assets under keys held by a [`KeyStore`]
//!
//! Every call resolves the key, runs one AEAD operation and drops the key
//! before returning; nothing here caches key material.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use obscura_core::{ConversionError, Dimensions, KeyIdentifier, TransformedImage};
use obscura_keystore::{KeyLocks, KeyStore, SymmetricKey};
use obscura_logging::OperationContext;

use crate::asset::EncryptedAsset;
use crate::error::{CipherError, CipherResult};
use crate::seal;

/// Encrypts and decrypts assets with per-asset keys
///
/// Cloning is cheap and clones share the same store and lock table.
pub struct CipherService<K: KeyStore> {
    store: Arc<K>,
    locks: Arc<KeyLocks>,
}

impl<K: KeyStore> Clone for CipherService<K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<K: KeyStore> CipherService<K> {
    /// Create a service with its own lock table
    pub fn new(store: Arc<K>) -> Self {
        Self::with_locks(store, Arc::new(KeyLocks::new()))
    }

    /// Create a service sharing `locks` with a revocation coordinator
    pub fn with_locks(store: Arc<K>, locks: Arc<KeyLocks>) -> Self {
        Self { store, locks }
    }

    pub fn store(&self) -> &Arc<K> {
        &self.store
    }

    pub fn locks(&self) -> &Arc<KeyLocks> {
        &self.locks
    }

    /// Seal `plaintext` into a new asset
    ///
    /// Without an identifier a fresh one is generated along with a new key.
    /// With an identifier, an existing key is reused; otherwise one is
    /// generated under that identifier.
    #[instrument(skip(self, plaintext), fields(len = plaintext.len()))]
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        dimensions: Dimensions,
        key_identifier: Option<&KeyIdentifier>,
    ) -> CipherResult<EncryptedAsset> {
        self.encrypt_inner(plaintext, dimensions, key_identifier, None, Some)
    }

    /// Seal a transformed image
    pub fn encrypt_image(
        &self,
        image: &TransformedImage,
        key_identifier: Option<&KeyIdentifier>,
    ) -> CipherResult<EncryptedAsset> {
        self.encrypt(image.bytes(), image.dimensions(), key_identifier)
    }

    /// Open an asset
    ///
    /// Revoked assets fail before the key store is consulted. A copy made
    /// before its asset was revoked is refused through the store's
    /// revocation record.
    #[instrument(skip(self, asset), fields(asset_id = %asset.id(), key_id = %asset.key_identifier()))]
    pub fn decrypt(&self, asset: &EncryptedAsset) -> CipherResult<Vec<u8>> {
        if asset.is_revoked() {
            debug!("Refusing to open revoked asset");
            return Err(CipherError::AlreadyRevoked(asset.id()));
        }

        let id = asset.key_identifier();
        let key = self.locks.with_lock(id, || {
            let revoked = self
                .store
                .is_asset_revoked(asset.id())
                .map_err(CipherError::KeyUnavailable)?;
            if revoked {
                debug!("Refusing to open stale copy of revoked asset");
                return Err(CipherError::AlreadyRevoked(asset.id()));
            }

            self.store.retrieve_key(id).map_err(|e| {
                if e.is_not_found() {
                    CipherError::KeyNotFound(id.to_string())
                } else {
                    CipherError::KeyUnavailable(e)
                }
            })
        })?;

        let nonce = asset.nonce_array()?;
        let tag = asset.tag_array()?;
        let plaintext = seal::open(&key, &nonce, asset.ciphertext(), &tag)?;

        if plaintext.is_empty() {
            return Err(ConversionError::EmptyPlaintext.into());
        }

        debug!("Opened asset");
        Ok(plaintext)
    }

    /// Open an asset back into image form
    pub fn decrypt_image(&self, asset: &EncryptedAsset) -> CipherResult<TransformedImage> {
        let bytes = self.decrypt(asset)?;
        Ok(TransformedImage::new(bytes, asset.dimensions())?)
    }

    /// Seal under the identifier's lock and hand the asset to `deliver`
    ///
    /// `deliver` runs while the lock is still held. If it refuses the asset
    /// (returns `None`), a key created by this call is discarded before the
    /// lock is released, so no other operation can have sealed under it.
    fn encrypt_inner<T>(
        &self,
        plaintext: &[u8],
        dimensions: Dimensions,
        key_identifier: Option<&KeyIdentifier>,
        cancel: Option<&CancellationToken>,
        deliver: impl FnOnce(EncryptedAsset) -> Option<T>,
    ) -> CipherResult<T> {
        dimensions.validate()?;
        if plaintext.is_empty() {
            return Err(ConversionError::EmptyPlaintext.into());
        }

        let cancelled = || cancel.is_some_and(CancellationToken::is_cancelled);
        if cancelled() {
            return Err(CipherError::Cancelled);
        }

        let reuse_existing = key_identifier.is_some();
        let id = key_identifier
            .cloned()
            .unwrap_or_else(KeyIdentifier::generate);

        self.locks.with_lock(&id, || {
            let (key, created) = self.obtain_key(&id, reuse_existing)?;

            let sealed = match seal::seal(&key, plaintext) {
                Ok(sealed) => sealed,
                Err(e) => {
                    if created {
                        self.discard_key(&id);
                    }
                    return Err(e);
                }
            };
            drop(key);

            // Last point where the caller can still back out
            if cancelled() {
                if created {
                    self.discard_key(&id);
                }
                debug!(key_id = %id, "Encrypt cancelled");
                return Err(CipherError::Cancelled);
            }

            let asset = EncryptedAsset::sealed(
                sealed.ciphertext,
                sealed.nonce,
                sealed.tag,
                id.clone(),
                dimensions,
            );
            let asset_id = asset.id();
            match deliver(asset) {
                Some(delivered) => {
                    debug!(%asset_id, key_id = %id, new_key = created, "Sealed asset");
                    Ok(delivered)
                }
                None => {
                    if created {
                        self.discard_key(&id);
                    }
                    debug!(%asset_id, key_id = %id, "Sealed asset abandoned by caller");
                    Err(CipherError::Cancelled)
                }
            }
        })
    }

    /// Reuse the stored key if asked to, generating one otherwise
    ///
    /// Returns whether the key was created by this call.
    fn obtain_key(&self, id: &KeyIdentifier, reuse_existing: bool) -> CipherResult<(SymmetricKey, bool)> {
        if reuse_existing {
            match self.store.retrieve_key(id) {
                Ok(key) => return Ok((key, false)),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(CipherError::KeyUnavailable(e)),
            }
        }

        let key = self
            .store
            .generate_key(id)
            .map_err(CipherError::KeyUnavailable)?;
        Ok((key, true))
    }

    /// Remove a key created for an encryption that did not complete
    fn discard_key(&self, id: &KeyIdentifier) {
        if let Err(e) = self.store.delete_key(id) {
            warn!(key_id = %id, error = %e, "Failed to discard key of abandoned encryption");
        }
    }
}

impl<K: KeyStore + 'static> CipherService<K> {
    /// [`encrypt`](Self::encrypt) on the blocking pool
    ///
    /// Cancelling `cancel`, or dropping the returned future, before the asset
    /// is returned yields `Cancelled` and removes any key this call created.
    /// The worker keeps the identifier locked until this future has accepted
    /// the asset, so there is no point at which the asset can be lost while
    /// its new key survives.
    pub async fn encrypt_async(
        &self,
        plaintext: Vec<u8>,
        dimensions: Dimensions,
        key_identifier: Option<KeyIdentifier>,
        cancel: CancellationToken,
    ) -> CipherResult<EncryptedAsset> {
        if cancel.is_cancelled() {
            return Err(CipherError::Cancelled);
        }

        let mut ctx = OperationContext::new("encrypt");
        if let Some(id) = &key_identifier {
            ctx = ctx.with_key(id.as_str());
        }
        let span = ctx.span();

        let service = self.clone();
        let worker_cancel = cancel.child_token();
        let guard = worker_cancel.clone().drop_guard();
        let (asset_tx, asset_rx) = oneshot::channel();
        let (accept_tx, accept_rx) = oneshot::channel::<()>();

        let handle = tokio::task::spawn_blocking(move || {
            let plaintext = Zeroizing::new(plaintext);
            span.in_scope(|| {
                service.encrypt_inner(
                    &plaintext,
                    dimensions,
                    key_identifier.as_ref(),
                    Some(&worker_cancel),
                    move |asset| {
                        asset_tx.send(asset).ok()?;
                        accept_rx.blocking_recv().ok()
                    },
                )
            })
        });

        let result = match asset_rx.await {
            Ok(asset) if !cancel.is_cancelled() => {
                // Accepting and returning happen in the same poll
                let _ = accept_tx.send(());
                Ok(asset)
            }
            _ => {
                // Refuse delivery and wait for the worker to roll back
                drop(accept_tx);
                join_worker(handle.await, "encrypt").and_then(|()| {
                    Err(CipherError::unknown("encrypt worker finished without an asset"))
                })
            }
        };
        guard.disarm();
        result
    }

    /// [`encrypt_image`](Self::encrypt_image) on the blocking pool
    pub async fn encrypt_image_async(
        &self,
        image: TransformedImage,
        key_identifier: Option<KeyIdentifier>,
        cancel: CancellationToken,
    ) -> CipherResult<EncryptedAsset> {
        let dimensions = image.dimensions();
        self.encrypt_async(image.into_bytes(), dimensions, key_identifier, cancel)
            .await
    }

    /// [`decrypt`](Self::decrypt) on the blocking pool
    ///
    /// Decryption has no side effects, so cancellation returns immediately
    /// and the worker's result is discarded.
    pub async fn decrypt_async(
        &self,
        asset: &EncryptedAsset,
        cancel: CancellationToken,
    ) -> CipherResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(CipherError::Cancelled);
        }

        let span = OperationContext::new("decrypt")
            .with_asset(asset.id())
            .with_key(asset.key_identifier().as_str())
            .span();

        let service = self.clone();
        let asset = asset.clone();
        let handle = tokio::task::spawn_blocking(move || span.in_scope(|| service.decrypt(&asset)));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Decrypt cancelled");
                Err(CipherError::Cancelled)
            }
            joined = handle => join_worker(joined, "decrypt"),
        }
    }

    /// [`decrypt_image`](Self::decrypt_image) on the blocking pool
    pub async fn decrypt_image_async(
        &self,
        asset: &EncryptedAsset,
        cancel: CancellationToken,
    ) -> CipherResult<TransformedImage> {
        let bytes = self.decrypt_async(asset, cancel).await?;
        Ok(TransformedImage::new(bytes, asset.dimensions())?)
    }
}

/// Flatten a blocking worker's result
pub(crate) fn join_worker<T>(
    joined: Result<CipherResult<T>, JoinError>,
    operation: &str,
) -> CipherResult<T> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(CipherError::Cancelled),
        Err(e) => Err(CipherError::unknown(format!("{operation} worker failed: {e}"))),
    }
}
