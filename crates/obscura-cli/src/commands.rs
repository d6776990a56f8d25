//! Command execution

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use obscura_core::{AuthenticationGate, Dimensions, KeyIdentifier, TransformedImage};
use obscura_crypto::{AssetProtector, EncryptedAsset};
use obscura_keystore::{InMemoryKeyStore, KeyStore, RedbKeyStore};

use crate::config::{Command, KeyStoreBackend, KeysCommand, ObscuraConfig};
use crate::gate::TerminalGate;

/// Open the configured store and run `command`
///
/// Ctrl-C cancels the in-flight operation.
pub async fn run(command: Command, config: ObscuraConfig) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let gate: Arc<dyn AuthenticationGate> = Arc::new(TerminalGate);

    match config.keystore.backend {
        KeyStoreBackend::Memory => {
            warn!("Using in-memory key store; keys are lost on exit");
            let store = Arc::new(InMemoryKeyStore::new(config.keystore.namespace.clone()));
            execute(store, command, &config, gate, cancel).await
        }
        KeyStoreBackend::Redb => {
            let store = RedbKeyStore::open(config.redb_config())
                .with_context(|| format!("opening key store {}", config.keystore.path.display()))?;
            execute(Arc::new(store), command, &config, gate, cancel).await
        }
    }
}

/// Run `command` against an already-open store
pub async fn execute<K: KeyStore + 'static>(
    store: Arc<K>,
    command: Command,
    config: &ObscuraConfig,
    gate: Arc<dyn AuthenticationGate>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let protector = AssetProtector::new(store.clone(), config.protector.clone()).with_gate(gate);

    match command {
        Command::Keygen { id } => {
            let id = KeyIdentifier::new(id)?;
            store.generate_key(&id)?;
            println!("Generated key {id}");
        }

        Command::Keys { command } => match command {
            KeysCommand::Exists { id } => {
                let id = KeyIdentifier::new(id)?;
                let state = if store.key_exists(&id) { "present" } else { "absent" };
                println!("{id}: {state}");
            }
            KeysCommand::Delete { id } => {
                let id = KeyIdentifier::new(id)?;
                store.delete_key(&id)?;
                println!("Deleted key {id}");
            }
            KeysCommand::Purge { yes } => {
                if !yes {
                    bail!(
                        "refusing to destroy every key in namespace '{}' without --yes",
                        store.namespace()
                    );
                }
                protector.revocation().revoke_all()?;
                println!("Destroyed every key in namespace '{}'", store.namespace());
            }
        },

        Command::Encrypt {
            input,
            width,
            height,
            key,
            out,
        } => {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let image = TransformedImage::new(bytes, Dimensions::new(width, height))?;
            let key = key.map(KeyIdentifier::new).transpose()?;

            let asset = protector
                .cipher()
                .encrypt_image_async(image, key, cancel)
                .await?;
            info!(asset_id = %asset.id(), key_id = %asset.key_identifier(), "Encrypted");

            let json = asset.to_json_pretty()?;
            match out {
                Some(out) => {
                    write_file(&out, json.as_bytes())?;
                    println!("Wrote asset {} to {}", asset.id(), out.display());
                }
                None => println!("{json}"),
            }
        }

        Command::Decrypt { asset, out } => {
            let record = read_asset(&asset)?;
            let reason = format!("Reveal protected image {}?", record.id());
            let image = protector.reveal(&record, &reason, cancel).await?;

            write_file(&out, image.bytes())?;
            println!(
                "Wrote {} bytes ({}) to {}",
                image.len(),
                image.dimensions(),
                out.display()
            );
        }

        Command::Revoke { asset } => {
            let mut record = read_asset(&asset)?;
            protector.revoke_async(&mut record, cancel).await?;

            // The key is already gone; a failed rewrite leaves a stale but unreadable record
            write_file(&asset, record.to_json_pretty()?.as_bytes())?;
            println!("Revoked asset {}", record.id());
        }

        Command::Inspect { asset } => {
            let record = read_asset(&asset)?;
            let recorded_revoked = store.is_asset_revoked(record.id()).unwrap_or_else(|e| {
                warn!(asset_id = %record.id(), error = %e, "Could not read revocation record");
                false
            });
            let key_state = if record.is_revoked() || recorded_revoked {
                "destroyed"
            } else if store.key_exists(record.key_identifier()) {
                "present"
            } else {
                "missing"
            };

            println!("Asset:      {}", record.id());
            println!("Key:        {} ({key_state})", record.key_identifier());
            println!("Created:    {}", record.timestamp().to_rfc3339());
            println!("Dimensions: {}", record.dimensions());
            println!("Ciphertext: {} bytes", record.ciphertext().len());
            println!("State:      {:?}", record.state());
        }
    }

    Ok(())
}

fn read_asset(path: &Path) -> anyhow::Result<EncryptedAsset> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading asset {}", path.display()))?;
    EncryptedAsset::from_json(&json).with_context(|| format!("parsing asset {}", path.display()))
}

/// Write via a temp file in the same directory, then rename over `path`
///
/// Readers never see a torn file, and concurrent writers each get their own
/// temp file.
fn write_file(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .with_context(|| format!("writing {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
