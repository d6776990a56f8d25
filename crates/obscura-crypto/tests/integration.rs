use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use obscura_core::{Dimensions, KeyIdentifier, TransformedImage};
use obscura_crypto::*;
use obscura_keystore::{InMemoryKeyStore, KeyStore, KeyStoreError, RedbKeyStore, RedbKeyStoreConfig};
use tempfile::TempDir;

fn id(s: &str) -> KeyIdentifier {
    KeyIdentifier::new(s).unwrap()
}

fn setup() -> (
    CipherService<InMemoryKeyStore>,
    RevocationCoordinator<InMemoryKeyStore>,
) {
    let cipher = CipherService::new(Arc::new(InMemoryKeyStore::new("integration")));
    let revocation = RevocationCoordinator::for_cipher(&cipher);
    (cipher, revocation)
}

// ----------------------------------------------------------------------------
// Encryption scenarios
// ----------------------------------------------------------------------------

#[test]
fn test_blue_square_encrypts_to_same_length() {
    let (cipher, _) = setup();
    let image = TransformedImage::solid_rgba(Dimensions::new(100, 100), [0, 0, 255, 255]).unwrap();
    assert_eq!(image.len(), 40_000);

    let asset = cipher.encrypt_image(&image, None).unwrap();

    assert_eq!(asset.ciphertext().len(), 40_000);
    assert_eq!(asset.nonce().len(), 12);
    assert_eq!(asset.tag().len(), 16);
    assert!(!asset.is_revoked());
    assert_eq!(asset.dimensions(), Dimensions::new(100, 100));
    assert!(cipher.store().key_exists(asset.key_identifier()));

    assert_eq!(cipher.decrypt_image(&asset).unwrap(), image);
}

#[test]
fn test_revoked_original_and_stale_copy_both_fail() {
    let (cipher, revocation) = setup();
    let mut original = cipher
        .encrypt(b"holiday photo", Dimensions::new(1, 1), Some(&id("k1")))
        .unwrap();
    let copy = original.clone();

    revocation.revoke(&mut original).unwrap();

    assert!(matches!(
        cipher.decrypt(&original),
        Err(CipherError::AlreadyRevoked(asset_id)) if asset_id == original.id()
    ));

    // The copy still says Active, but the store remembers the revocation
    assert!(!copy.is_revoked());
    assert!(matches!(
        cipher.decrypt(&copy),
        Err(CipherError::AlreadyRevoked(asset_id)) if asset_id == copy.id()
    ));
    assert!(!cipher.store().key_exists(&id("k1")));
}

#[test]
fn test_duplicate_key_generation() {
    let store = InMemoryKeyStore::new("integration");
    let first = store.generate_key(&id("dup")).unwrap();

    assert!(matches!(
        store.generate_key(&id("dup")),
        Err(KeyStoreError::DuplicateIdentifier(_))
    ));
    assert_eq!(store.retrieve_key(&id("dup")).unwrap(), first);
}

#[test]
fn test_shared_key_revocation_affects_all_assets_under_it() {
    let (cipher, revocation) = setup();
    let mut first = cipher
        .encrypt(b"one", Dimensions::new(1, 1), Some(&id("album")))
        .unwrap();
    let second = cipher
        .encrypt(b"two", Dimensions::new(1, 1), Some(&id("album")))
        .unwrap();

    revocation.revoke(&mut first).unwrap();

    // Only the revoked asset is recorded; its sibling just lost its key
    assert!(matches!(
        cipher.decrypt(&second),
        Err(CipherError::KeyNotFound(_))
    ));
}

#[test]
fn test_encrypt_after_revoke_with_same_identifier_uses_new_key() {
    let (cipher, revocation) = setup();
    let mut old = cipher
        .encrypt(b"old", Dimensions::new(1, 1), Some(&id("reused")))
        .unwrap();
    revocation.revoke(&mut old).unwrap();

    let new = cipher
        .encrypt(b"new", Dimensions::new(1, 1), Some(&id("reused")))
        .unwrap();
    assert_eq!(cipher.decrypt(&new).unwrap(), b"new");

    // Rebuild the old record as if it were never revoked
    let mut parts = old.into_parts();
    parts.is_revoked = false;
    let unflagged = EncryptedAsset::from_parts(parts.clone());
    assert!(matches!(
        cipher.decrypt(&unflagged),
        Err(CipherError::AlreadyRevoked(_))
    ));

    // Even under a fresh asset id the new key cannot open the old ciphertext
    parts.id = uuid::Uuid::new_v4();
    let forged = EncryptedAsset::from_parts(parts);
    assert!(matches!(
        cipher.decrypt(&forged),
        Err(CipherError::AuthenticationFailed)
    ));
}

#[test]
fn test_every_bit_flip_in_tag_is_detected() {
    let (cipher, _) = setup();
    let asset = cipher
        .encrypt(b"tamper target", Dimensions::new(1, 1), None)
        .unwrap();

    for byte in 0..TAG_SIZE {
        for bit in 0..8 {
            let mut parts = asset.clone().into_parts();
            parts.tag[byte] ^= 1 << bit;
            let tampered = EncryptedAsset::from_parts(parts);
            assert!(
                matches!(cipher.decrypt(&tampered), Err(CipherError::AuthenticationFailed)),
                "flip of tag byte {byte} bit {bit} went undetected"
            );
        }
    }
}

// ----------------------------------------------------------------------------
// Wire format
// ----------------------------------------------------------------------------

#[test]
fn test_wire_format() {
    let (cipher, _) = setup();
    let asset = cipher
        .encrypt(&[0xAB; 20], Dimensions::new(5, 1), Some(&id("wire")))
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&asset.to_json().unwrap()).unwrap();

    assert_eq!(value["id"], asset.id().to_string());
    assert_eq!(value["keyIdentifier"], "wire");
    assert_eq!(value["isRevoked"], false);
    assert_eq!(value["dimensions"]["width"], 5);
    assert_eq!(value["dimensions"]["height"], 1);

    let iv = STANDARD.decode(value["iv"].as_str().unwrap()).unwrap();
    let tag = STANDARD.decode(value["tag"].as_str().unwrap()).unwrap();
    let ciphertext = STANDARD.decode(value["ciphertext"].as_str().unwrap()).unwrap();
    assert_eq!(iv, asset.nonce());
    assert_eq!(tag, asset.tag());
    assert_eq!(ciphertext, asset.ciphertext());

    let timestamp = value["timestamp"].as_str().unwrap();
    let parsed = chrono::DateTime::parse_from_rfc3339(timestamp).unwrap();
    assert_eq!(parsed, asset.timestamp());
}

#[test]
fn test_deserialized_asset_decrypts() {
    let (cipher, revocation) = setup();
    let asset = cipher
        .encrypt(b"persisted", Dimensions::new(3, 3), None)
        .unwrap();

    let restored = EncryptedAsset::from_json(&asset.to_json_pretty().unwrap()).unwrap();
    assert_eq!(restored, asset);
    assert_eq!(cipher.decrypt(&restored).unwrap(), b"persisted");

    // Revocation state survives the round trip
    let revoked = revocation.revoked(&restored).unwrap();
    let restored = EncryptedAsset::from_json(&revoked.to_json().unwrap()).unwrap();
    assert!(restored.is_revoked());
    assert!(matches!(
        cipher.decrypt(&restored),
        Err(CipherError::AlreadyRevoked(_))
    ));
}

#[test]
fn test_short_iv_on_the_wire_is_malformed() {
    let (cipher, _) = setup();
    let asset = cipher.encrypt(b"data", Dimensions::new(1, 1), None).unwrap();

    let mut value: serde_json::Value = serde_json::from_str(&asset.to_json().unwrap()).unwrap();
    value["iv"] = serde_json::Value::String(STANDARD.encode([0u8; 8]));

    let restored = EncryptedAsset::from_json(&value.to_string()).unwrap();
    assert!(matches!(
        cipher.decrypt(&restored),
        Err(CipherError::MalformedNonce {
            expected: 12,
            actual: 8
        })
    ));
}

// ----------------------------------------------------------------------------
// Durable store
// ----------------------------------------------------------------------------

#[test]
fn test_revocation_survives_restart() {
    let temp = TempDir::new().unwrap();
    let config = RedbKeyStoreConfig {
        db_path: temp.path().join("keys.redb"),
        namespace: "photos".to_string(),
    };

    let (kept, mut revoked) = {
        let cipher = CipherService::new(Arc::new(RedbKeyStore::open(config.clone()).unwrap()));
        let kept = cipher.encrypt(b"keep me", Dimensions::new(1, 1), None).unwrap();
        let revoked = cipher.encrypt(b"destroy me", Dimensions::new(1, 1), None).unwrap();
        (kept, revoked)
    };

    {
        let cipher = CipherService::new(Arc::new(RedbKeyStore::open(config.clone()).unwrap()));
        RevocationCoordinator::for_cipher(&cipher)
            .revoke(&mut revoked)
            .unwrap();
    }

    let cipher = CipherService::new(Arc::new(RedbKeyStore::open(config).unwrap()));
    assert_eq!(cipher.decrypt(&kept).unwrap(), b"keep me");

    let mut stale = revoked.into_parts();
    stale.is_revoked = false;
    assert!(matches!(
        cipher.decrypt(&EncryptedAsset::from_parts(stale)),
        Err(CipherError::AlreadyRevoked(_))
    ));
}
