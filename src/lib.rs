// src/lib.rs
//! passvault: a local, single-user credential vault
//!
//! Features:
//! - SQLCipher whole-file encryption keyed by the master passphrase
//! - AES-256-GCM per-field encryption for usernames, secrets and notes
//! - PBKDF2-HMAC-SHA256 field key with a per-vault salt
//! - Staged re-key, verified backups and crash-safe restore
//! - Transactional JSON / CSV import and export

pub mod aliases;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod db;
pub mod enums;
pub mod error;
pub mod events;
pub mod export;
pub mod handle;
pub mod record;
pub mod service;
pub mod view;

// Re-export everything users need at the crate root
pub use aliases::{FieldKey32, MasterPassphrase};
pub use config::{load as load_config, Config};
pub use crypto::{FieldCipher, KeyDerivation};
pub use db::{BackupReport, CredentialStore, StoreState, VaultStats};
pub use enums::{DataFormat, SortKey};
pub use error::{CoreError, CoreResult};
pub use events::{ChangeListener, VaultEvent};
pub use handle::VaultHandle;
pub use record::Credential;
pub use service::{ImportSummary, VaultService};
