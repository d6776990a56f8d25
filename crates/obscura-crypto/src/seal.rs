//! ChaCha20-Poly1305 primitives
//!
//! Detached-tag seal and open over a caller-held key. No associated data is
//! bound; asset metadata travels alongside the ciphertext unauthenticated.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use rand::RngCore;
use zeroize::Zeroize;

use obscura_keystore::SymmetricKey;

use crate::asset::{NONCE_SIZE, TAG_SIZE};
use crate::error::CipherError;

/// Output of one seal
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
    pub tag: [u8; TAG_SIZE],
}

/// Draw a fresh random nonce
///
/// 96 random bits per call; collisions under one key are negligible well past
/// any realistic number of encryptions per asset key.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key` with a fresh nonce
pub fn seal(key: &SymmetricKey, plaintext: &[u8]) -> Result<Sealed, CipherError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = generate_nonce();

    let mut buffer = plaintext.to_vec();
    let tag = match cipher.encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut buffer) {
        Ok(tag) => tag,
        Err(e) => {
            buffer.zeroize();
            return Err(CipherError::seal_failed(e.to_string()));
        }
    };

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);

    Ok(Sealed {
        ciphertext: buffer,
        nonce,
        tag: tag_bytes,
    })
}

/// Verify the tag and decrypt
///
/// Returns `AuthenticationFailed` on any mismatch and never yields partial
/// plaintext.
pub fn open(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
) -> Result<Vec<u8>, CipherError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut buffer = ciphertext.to_vec();
    match cipher.decrypt_in_place_detached(
        Nonce::from_slice(nonce),
        b"",
        &mut buffer,
        Tag::from_slice(tag),
    ) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            Err(CipherError::AuthenticationFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = SymmetricKey::generate();
        let plaintext = b"blurred pixels";

        let sealed = seal(&key, plaintext).unwrap();
        assert_eq!(sealed.ciphertext.len(), plaintext.len());
        assert_ne!(sealed.ciphertext.as_slice(), plaintext.as_slice());

        let opened = open(&key, &sealed.nonce, &sealed.ciphertext, &sealed.tag).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = seal(&SymmetricKey::generate(), b"secret").unwrap();
        let result = open(
            &SymmetricKey::generate(),
            &sealed.nonce,
            &sealed.ciphertext,
            &sealed.tag,
        );
        assert!(matches!(result, Err(CipherError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_inputs_fail() {
        let key = SymmetricKey::generate();
        let sealed = seal(&key, b"secret image bytes").unwrap();

        let mut ciphertext = sealed.ciphertext.clone();
        ciphertext[0] ^= 0x01;
        assert!(open(&key, &sealed.nonce, &ciphertext, &sealed.tag).is_err());

        let mut tag = sealed.tag;
        tag[15] ^= 0x80;
        assert!(open(&key, &sealed.nonce, &sealed.ciphertext, &tag).is_err());

        let mut nonce = sealed.nonce;
        nonce[0] ^= 0x01;
        assert!(open(&key, &nonce, &sealed.ciphertext, &sealed.tag).is_err());
    }

    #[test]
    fn test_nonces_differ() {
        let key = SymmetricKey::generate();
        let a = seal(&key, b"same").unwrap();
        let b = seal(&key, b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
