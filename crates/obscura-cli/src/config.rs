use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use obscura_crypto::ProtectorConfig;
use obscura_keystore::RedbKeyStoreConfig;
use obscura_logging::LogConfig;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "obscura.toml";

#[derive(Parser)]
#[command(
    name = "obscura",
    version,
    about = "Seal transformed images under keys that can be destroyed"
)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a new key under an identifier
    Keygen {
        /// Key identifier
        id: String,
    },
    /// Inspect or destroy stored keys
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
    /// Seal an image file into an asset
    Encrypt {
        /// Raw image bytes to seal
        input: PathBuf,
        /// Image width in pixels
        #[arg(long)]
        width: u32,
        /// Image height in pixels
        #[arg(long)]
        height: u32,
        /// Key identifier to use (generated when omitted)
        #[arg(long)]
        key: Option<String>,
        /// Where to write the asset JSON (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Open an asset and write the image bytes
    Decrypt {
        /// Asset JSON file
        asset: PathBuf,
        /// Where to write the image bytes
        #[arg(long)]
        out: PathBuf,
    },
    /// Destroy an asset's key and mark the asset file revoked
    Revoke {
        /// Asset JSON file (rewritten in place)
        asset: PathBuf,
    },
    /// Print asset metadata
    Inspect {
        /// Asset JSON file
        asset: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Report whether a key is stored
    Exists {
        /// Key identifier
        id: String,
    },
    /// Destroy one key
    Delete {
        /// Key identifier
        id: String,
    },
    /// Destroy every key in the namespace
    Purge {
        /// Confirm destruction
        #[arg(long)]
        yes: bool,
    },
}

/// Which key store backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyStoreBackend {
    /// Process-local; keys vanish on exit
    Memory,
    /// Durable redb file
    #[default]
    Redb,
}

/// Key store section of the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreSettings {
    pub backend: KeyStoreBackend,
    /// Database file for the redb backend
    pub path: PathBuf,
    pub namespace: String,
}

impl Default for KeyStoreSettings {
    fn default() -> Self {
        let redb = RedbKeyStoreConfig::default();
        Self {
            backend: KeyStoreBackend::default(),
            path: redb.db_path,
            namespace: redb.namespace,
        }
    }
}

/// Top-level config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObscuraConfig {
    pub keystore: KeyStoreSettings,
    pub protector: ProtectorConfig,
    pub logging: LogConfig,
}

impl Default for ObscuraConfig {
    fn default() -> Self {
        Self {
            keystore: KeyStoreSettings::default(),
            protector: ProtectorConfig::default(),
            logging: LogConfig::cli(),
        }
    }
}

impl ObscuraConfig {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, `obscura.toml` in the
    /// working directory is used when present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn redb_config(&self) -> RedbKeyStoreConfig {
        RedbKeyStoreConfig {
            db_path: self.keystore.path.clone(),
            namespace: self.keystore.namespace.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use obscura_logging::ConsoleTarget;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_encrypt() {
        let cli = Cli::try_parse_from([
            "obscura",
            "--log-level",
            "debug",
            "encrypt",
            "photo.raw",
            "--width",
            "100",
            "--height",
            "50",
            "--key",
            "k1",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Encrypt {
                input,
                width,
                height,
                key,
                out,
            } => {
                assert_eq!(input, PathBuf::from("photo.raw"));
                assert_eq!((width, height), (100, 50));
                assert_eq!(key.as_deref(), Some("k1"));
                assert!(out.is_none());
            }
            _ => panic!("expected encrypt"),
        }
    }

    #[test]
    fn test_parse_purge_requires_flag_value() {
        let cli = Cli::try_parse_from(["obscura", "keys", "purge"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Keys {
                command: KeysCommand::Purge { yes: false }
            }
        ));
    }

    #[test]
    fn test_encrypt_requires_dimensions() {
        assert!(Cli::try_parse_from(["obscura", "encrypt", "photo.raw"]).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = ObscuraConfig::default();
        assert_eq!(config.keystore.backend, KeyStoreBackend::Redb);
        assert_eq!(config.keystore.namespace, "default");
        assert!(config.protector.require_authentication);
        assert_eq!(config.logging.console.target, ConsoleTarget::Stderr);
    }

    #[test]
    fn test_partial_toml() {
        let config = ObscuraConfig::from_toml_str(
            r#"
            [keystore]
            backend = "memory"
            namespace = "scans"

            [protector]
            require_authentication = false
            "#,
        )
        .unwrap();

        assert_eq!(config.keystore.backend, KeyStoreBackend::Memory);
        assert_eq!(config.keystore.namespace, "scans");
        assert_eq!(config.keystore.path, KeyStoreSettings::default().path);
        assert!(!config.protector.require_authentication);
        assert_eq!(config.logging, LogConfig::cli());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ObscuraConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(ObscuraConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(ObscuraConfig::from_toml_str("[keystore]\nbackend = \"s3\"").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        std::fs::write(&path, "[keystore]\nnamespace = \"custom\"\n").unwrap();

        let config = ObscuraConfig::load(Some(&path)).unwrap();
        assert_eq!(config.keystore.namespace, "custom");
        assert!(ObscuraConfig::load(Some(&temp.path().join("missing.toml"))).is_err());
    }
}
