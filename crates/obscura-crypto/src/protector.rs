//! High-level protect / reveal / revoke flows
//!
//! `AssetProtector` ties the pixel transform, the cipher, the revocation
//! coordinator and the local authentication gate together. The cipher and
//! the coordinator share one lock table.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use obscura_core::{AuthError, AuthenticationGate, KeyIdentifier, PixelTransform, TransformedImage};
use obscura_keystore::{KeyLocks, KeyStore};

use crate::asset::EncryptedAsset;
use crate::cipher::{CipherService, join_worker};
use crate::error::{CipherError, CipherResult};
use crate::revocation::RevocationCoordinator;

/// Protector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectorConfig {
    /// Consult the authentication gate before every reveal
    pub require_authentication: bool,
}

impl Default for ProtectorConfig {
    fn default() -> Self {
        Self {
            require_authentication: true,
        }
    }
}

impl ProtectorConfig {
    /// No authentication prompt; for tests and headless tools
    pub fn unattended() -> Self {
        Self {
            require_authentication: false,
        }
    }
}

/// Protects images end to end
pub struct AssetProtector<K: KeyStore> {
    cipher: CipherService<K>,
    revocation: RevocationCoordinator<K>,
    gate: Option<Arc<dyn AuthenticationGate>>,
    config: ProtectorConfig,
}

impl<K: KeyStore + 'static> AssetProtector<K> {
    pub fn new(store: Arc<K>, config: ProtectorConfig) -> Self {
        let locks = Arc::new(KeyLocks::new());
        Self {
            cipher: CipherService::with_locks(store.clone(), locks.clone()),
            revocation: RevocationCoordinator::with_locks(store, locks),
            gate: None,
            config,
        }
    }

    /// Attach the gate consulted by [`reveal`](Self::reveal)
    pub fn with_gate(mut self, gate: Arc<dyn AuthenticationGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn cipher(&self) -> &CipherService<K> {
        &self.cipher
    }

    pub fn revocation(&self) -> &RevocationCoordinator<K> {
        &self.revocation
    }

    pub fn config(&self) -> &ProtectorConfig {
        &self.config
    }

    /// Transform `image` and seal the result
    pub async fn protect(
        &self,
        transform: Arc<dyn PixelTransform>,
        image: TransformedImage,
        key_identifier: Option<KeyIdentifier>,
        cancel: CancellationToken,
    ) -> CipherResult<EncryptedAsset> {
        if cancel.is_cancelled() {
            return Err(CipherError::Cancelled);
        }

        let handle = tokio::task::spawn_blocking(move || {
            transform.apply(&image).map_err(CipherError::from)
        });
        let transformed = join_worker(handle.await, "transform")?;

        self.cipher
            .encrypt_image_async(transformed, key_identifier, cancel)
            .await
    }

    /// Authenticate the user if configured, then open the asset
    ///
    /// Revoked assets fail before the gate is consulted.
    pub async fn reveal(
        &self,
        asset: &EncryptedAsset,
        reason: &str,
        cancel: CancellationToken,
    ) -> CipherResult<TransformedImage> {
        if asset.is_revoked() {
            return Err(CipherError::AlreadyRevoked(asset.id()));
        }

        if self.config.require_authentication {
            self.authenticate(reason, &cancel).await?;
        }

        self.cipher.decrypt_image_async(asset, cancel).await
    }

    /// Revoke through the shared coordinator
    pub fn revoke(&self, asset: &mut EncryptedAsset) -> CipherResult<()> {
        self.revocation.revoke(asset)
    }

    pub async fn revoke_async(
        &self,
        asset: &mut EncryptedAsset,
        cancel: CancellationToken,
    ) -> CipherResult<()> {
        self.revocation.revoke_async(asset, cancel).await
    }

    async fn authenticate(&self, reason: &str, cancel: &CancellationToken) -> CipherResult<()> {
        let gate = self
            .gate
            .as_ref()
            .filter(|gate| gate.is_available())
            .ok_or(CipherError::Authentication(AuthError::Unavailable))?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CipherError::Cancelled),
            result = gate.authenticate(reason) => result.map_err(|e| {
                debug!(error = %e, "Authentication refused");
                CipherError::Authentication(e)
            }),
        }
    }
}
