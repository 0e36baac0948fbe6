// src/crypto/field.rs
//! Per-field authenticated encryption
//!
//! Wire format of an encrypted field, stored as standard base64 text:
//!
//! ```text
//! nonce (12 bytes) || AES-256-GCM ciphertext || tag (16 bytes)
//! ```
//!
//! The empty string encrypts to the empty string, so blank optional fields
//! do not leak a fixed-size ciphertext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

use crate::aliases::FieldKey32;
use crate::consts::{NONCE_LEN, TAG_LEN};
use crate::error::{CoreError, CoreResult};

/// Stateless apart from the key it was built with
pub struct FieldCipher {
    key: FieldKey32,
}

impl FieldCipher {
    pub fn new(key: FieldKey32) -> Self {
        Self { key }
    }

    fn aead(&self) -> CoreResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key.expose_secret())
            .map_err(|e| CoreError::Crypto(e.to_string()))
    }

    /// Raw form: `nonce || ciphertext || tag`
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> CoreResult<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .aead()?
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CoreError::Crypto(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    pub fn decrypt_bytes(&self, blob: &[u8]) -> CoreResult<Vec<u8>> {
        if blob.is_empty() {
            return Ok(Vec::new());
        }
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CoreError::DecryptionFailed);
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        self.aead()?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CoreError::DecryptionFailed)
    }

    /// Encrypt a text field into its base64 column representation
    pub fn encrypt(&self, plaintext: &str) -> CoreResult<String> {
        let blob = self.encrypt_bytes(plaintext.as_bytes())?;
        Ok(STANDARD.encode(blob))
    }

    pub fn decrypt(&self, encoded: &str) -> CoreResult<String> {
        if encoded.is_empty() {
            return Ok(String::new());
        }
        let blob = STANDARD
            .decode(encoded)
            .map_err(|_| CoreError::DecryptionFailed)?;
        let plaintext = self.decrypt_bytes(&blob)?;
        String::from_utf8(plaintext).map_err(|_| CoreError::DecryptionFailed)
    }
}
