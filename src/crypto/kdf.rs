// src/crypto/kdf.rs
//! Master passphrase → field key derivation
//!
//! PBKDF2-HMAC-SHA256 over a per-vault random salt. The round count is
//! stored alongside the salt so an existing vault keeps deriving the same
//! key even if the configured default changes later.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::aliases::FieldKey32;
use crate::consts::{FIELD_KEY_LEN, MIN_FIELD_KDF_ITERATIONS, SALT_LEN};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDerivation {
    iterations: u32,
}

impl KeyDerivation {
    pub fn new(iterations: u32) -> CoreResult<Self> {
        if iterations < MIN_FIELD_KDF_ITERATIONS {
            return Err(CoreError::InvalidArgument(format!(
                "KDF iterations must be at least {MIN_FIELD_KDF_ITERATIONS}"
            )));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Deterministic: same passphrase + salt + rounds always yields the same key
    pub fn derive(&self, passphrase: &str, salt: &[u8]) -> CoreResult<FieldKey32> {
        if passphrase.is_empty() {
            return Err(CoreError::InvalidArgument(
                "master passphrase cannot be empty".into(),
            ));
        }
        if salt.len() != SALT_LEN {
            return Err(CoreError::Crypto(format!(
                "salt must be {SALT_LEN} bytes, got {}",
                salt.len()
            )));
        }

        let mut out = [0u8; FIELD_KEY_LEN];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, self.iterations, &mut out);
        let key = FieldKey32::new(out);
        out.zeroize();
        Ok(key)
    }

    /// Fresh CSPRNG salt, generated once per vault (and again on passphrase change)
    pub fn generate_salt() -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        salt
    }
}
