//! # Obscura CLI
//!
//! The `obscura` binary: seal image files into asset JSON, reveal them
//! behind a terminal confirmation, and revoke them by destroying keys.

pub mod commands;
pub mod config;
pub mod gate;

pub use config::{Cli, Command, KeysCommand, ObscuraConfig};
