// src/consts.rs
//! Shared constants: security parameters and defaults

/// SQLCipher KDF iterations for the vault file key
// Matches SQLCipher 4 defaults so attached staging databases inherit them
pub const DB_KDF_ITERATIONS: u32 = 256_000;

/// SQLCipher page size
pub const DB_CIPHER_PAGE_SIZE: u32 = 4096;

/// Default PBKDF2-HMAC-SHA256 rounds for the field-encryption key
pub const DEFAULT_FIELD_KDF_ITERATIONS: u32 = 100_000;

/// Lowest accepted round count; anything cheaper is a single-hash in disguise
pub const MIN_FIELD_KDF_ITERATIONS: u32 = 10_000;

/// Per-vault random salt length in bytes
pub const SALT_LEN: usize = 32;

/// Derived field key length (AES-256)
pub const FIELD_KEY_LEN: usize = 32;

/// AES-GCM nonce length prepended to every encrypted field
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length appended by the cipher
pub const TAG_LEN: usize = 16;

/// Known plaintext encrypted under the field key to verify passphrases
pub const VERIFICATION_PLAINTEXT: &str = "passvault-verification-token";

/// Placeholder written instead of a secret when exporting without secrets
pub const HIDDEN_SECRET_MARKER: &str = "***HIDDEN***";

/// Current records schema version
pub const SCHEMA_VERSION: i64 = 1;

/// Default vault file name
pub const DEFAULT_DB_FILENAME: &str = "passwords.db";

/// Per-user application directory name
pub const APP_DIR_NAME: &str = "passvault";

/// Header row of the CSV interchange format
pub const CSV_HEADER: [&str; 9] = [
    "Title", "Username", "Password", "Website", "Notes", "Category", "Created", "Updated",
    "Favorite",
];

/// vault_config keys
pub const CONFIG_KEY_SALT: &str = "kdf_salt";
pub const CONFIG_KEY_TOKEN: &str = "verification_token";
pub const CONFIG_KEY_ITERATIONS: &str = "kdf_iterations";
