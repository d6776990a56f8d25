//! # Obscura Crypto
//!
//! Authenticated encryption of transformed images, with revocation by key
//! destruction.
//!
//! ## Security Model
//!
//! - Each asset is sealed with ChaCha20-Poly1305 under a 256-bit key held by
//!   a [`KeyStore`](obscura_keystore::KeyStore)
//! - A fresh random 96-bit nonce is drawn for every encryption
//! - The tag is stored detached; any modification of ciphertext, nonce or
//!   tag fails decryption without yielding plaintext
//! - Revocation destroys the key and records the asset as revoked in the
//!   same store write, then flags the record; a copy of the record made
//!   earlier fails with `AlreadyRevoked` too
//! - Asset metadata (dimensions, timestamp) is not authenticated
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use obscura_core::Dimensions;
//! use obscura_crypto::{CipherService, RevocationCoordinator};
//! use obscura_keystore::InMemoryKeyStore;
//!
//! let cipher = CipherService::new(Arc::new(InMemoryKeyStore::new("photos")));
//! let revocation = RevocationCoordinator::for_cipher(&cipher);
//!
//! let mut asset = cipher.encrypt(&pixels, Dimensions::new(100, 100), None)?;
//! assert_eq!(cipher.decrypt(&asset)?, pixels);
//!
//! revocation.revoke(&mut asset)?;
//! assert!(cipher.decrypt(&asset).is_err());
//! ```

pub mod asset;
pub mod cipher;
pub mod error;
pub mod protector;
pub mod revocation;
pub mod seal;

// Re-exports
pub use asset::{AssetParts, AssetState, EncryptedAsset, NONCE_SIZE, TAG_SIZE};
pub use cipher::CipherService;
pub use error::{CipherError, CipherResult};
pub use protector::{AssetProtector, ProtectorConfig};
pub use revocation::RevocationCoordinator;
