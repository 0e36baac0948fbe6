// src/error.rs
//! Public error type for the entire crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Vault is already initialized")]
    AlreadyInitialized,

    #[error("Vault is not initialized or not unlocked")]
    NotInitialized,

    #[error("Crypto operation failed: {0}")]
    Crypto(String),

    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Another vault operation is already in progress")]
    Busy,

    #[error("Malformed import data: {0}")]
    Format(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No records were imported")]
    NothingImported,

    #[error("Restore failed, previous vault reinstated: {0}")]
    RestoreFailed(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Format(err.to_string())
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        CoreError::Config(err.to_string())
    }
}

impl CoreError {
    /// Message suitable for showing to the person at the keyboard.
    ///
    /// Engine and IO details are kept out of this string; they still reach
    /// the logs through `Display`.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::InvalidArgument(what) => format!("Invalid input: {what}"),
            CoreError::AlreadyInitialized => "A master password has already been set".into(),
            CoreError::NotInitialized => "The vault is locked. Unlock it first".into(),
            CoreError::Crypto(_) => "Encryption failed".into(),
            CoreError::DecryptionFailed => {
                "Stored data could not be decrypted with this master password".into()
            }
            CoreError::Io(_) => "Could not access the vault file".into(),
            CoreError::Validation(what) => what.clone(),
            CoreError::Sql(_) => "The vault database reported an error".into(),
            CoreError::Busy => "Please wait for the current operation to finish".into(),
            CoreError::Format(what) => format!("The import file is not valid: {what}"),
            CoreError::Config(what) => format!("Configuration problem: {what}"),
            CoreError::NothingImported => "No passwords were imported".into(),
            CoreError::RestoreFailed(_) => {
                "Restore failed; the previous vault has been kept".into()
            }
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
