//! # Obscura Core
//!
//! Core types, traits, and errors shared by the Obscura crates.
//!
//! Obscura seals transformed (blurred) images under per-asset symmetric keys
//! and makes them permanently unreadable by destroying those keys. This crate
//! holds the pieces every layer agrees on:
//!
//! ## Key Types
//!
//! - [`KeyIdentifier`]: Validated name of a key inside a key store namespace
//! - [`Dimensions`]: Width/height metadata carried alongside image bytes
//! - [`TransformedImage`]: Plaintext image bytes produced by a [`PixelTransform`]
//! - [`ErrorKind`]: Coarse error taxonomy used to pick user-facing behavior
//!
//! ## Collaborator Traits
//!
//! - [`AuthenticationGate`]: Local authentication factor consulted before decryption
//! - [`PixelTransform`]: Stateless image filter producing the bytes to seal

pub mod error;
pub mod identifier;
pub mod image;
pub mod traits;

// Re-export main types
pub use error::*;
pub use identifier::*;
pub use image::*;
pub use traits::*;
