// src/db/mod.rs
//! SQLCipher-backed credential storage

pub mod backup;
pub mod vault_db_conn;
pub mod vault_db_ops;

pub use backup::BackupReport;
pub use vault_db_conn::{CredentialStore, StoreState, VaultStats};
pub use vault_db_ops::SecretMode;
