//! Encryption at rest for store values

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::backend::{StorageError, StorageResult};

const NONCE_LEN: usize = 12;

/// Seals values with AES-256-GCM before they reach a backend
///
/// The key is the SHA-256 digest of the configured secret. Sealed output is
/// the random 96-bit nonce followed by the ciphertext and tag.
#[derive(Clone)]
pub struct Encrypter {
    cipher: Aes256Gcm,
}

impl Encrypter {
    /// Derive an encrypter from a secret
    pub fn from_secret(secret: &str) -> StorageResult<Self> {
        if secret.is_empty() {
            return Err(StorageError::InvalidInput(
                "encryption key must not be empty".into(),
            ));
        }
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt `plaintext`
    pub fn seal(&self, plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| StorageError::Encryption("failed to seal value".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt output of [`seal`](Self::seal)
    pub fn open(&self, sealed: &[u8]) -> StorageResult<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(StorageError::Encryption("sealed value is truncated".into()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StorageError::Encryption("failed to open value".into()))
    }
}

impl fmt::Debug for Encrypter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encrypter").finish_non_exhaustive()
    }
}
