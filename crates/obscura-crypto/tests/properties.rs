//! Property tests for sealing and revocation

use std::sync::Arc;

use obscura_core::Dimensions;
use obscura_crypto::*;
use obscura_keystore::{InMemoryKeyStore, KeyStore};
use proptest::prelude::*;

fn cipher() -> CipherService<InMemoryKeyStore> {
    CipherService::new(Arc::new(InMemoryKeyStore::new("props")))
}

proptest! {
    #[test]
    fn decrypt_inverts_encrypt(
        plaintext in prop::collection::vec(any::<u8>(), 1..4096),
        width in 1u32..512,
        height in 1u32..512,
    ) {
        let cipher = cipher();
        let asset = cipher.encrypt(&plaintext, Dimensions::new(width, height), None).unwrap();

        prop_assert_eq!(asset.ciphertext().len(), plaintext.len());
        prop_assert_eq!(cipher.decrypt(&asset).unwrap(), plaintext);
    }

    #[test]
    fn any_ciphertext_bit_flip_is_detected(
        plaintext in prop::collection::vec(any::<u8>(), 1..512),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let cipher = cipher();
        let asset = cipher.encrypt(&plaintext, Dimensions::new(1, 1), None).unwrap();

        let mut parts = asset.into_parts();
        let byte = position.index(parts.ciphertext.len());
        parts.ciphertext[byte] ^= 1 << bit;

        prop_assert!(matches!(
            cipher.decrypt(&EncryptedAsset::from_parts(parts)),
            Err(CipherError::AuthenticationFailed)
        ));
    }

    #[test]
    fn json_roundtrip_preserves_decryptability(
        plaintext in prop::collection::vec(any::<u8>(), 1..1024),
    ) {
        let cipher = cipher();
        let asset = cipher.encrypt(&plaintext, Dimensions::new(1, 1), None).unwrap();

        let restored = EncryptedAsset::from_json(&asset.to_json().unwrap()).unwrap();
        prop_assert_eq!(&restored, &asset);
        prop_assert_eq!(cipher.decrypt(&restored).unwrap(), plaintext);
    }

    #[test]
    fn revocation_is_terminal(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        attempts in 1usize..5,
    ) {
        let cipher = cipher();
        let revocation = RevocationCoordinator::for_cipher(&cipher);
        let mut asset = cipher.encrypt(&plaintext, Dimensions::new(1, 1), None).unwrap();

        revocation.revoke(&mut asset).unwrap();
        prop_assert!(!cipher.store().key_exists(asset.key_identifier()));

        for _ in 0..attempts {
            prop_assert!(matches!(cipher.decrypt(&asset), Err(CipherError::AlreadyRevoked(_))));
            prop_assert!(matches!(revocation.revoke(&mut asset), Err(CipherError::AlreadyRevoked(_))));
        }
        prop_assert_eq!(asset.state(), AssetState::Revoked);
    }
}
