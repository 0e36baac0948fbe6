// src/db/vault_db_conn.rs
//! The encrypted vault file and its connection lifecycle
//!
//! ```text
//! Closed ──open_file──▶ Open ──set_passphrase / unlock──▶ Unlocked
//!   ▲                    │  ◀──────────── lock ──────────────┘
//!   └────── close ───────┘
//! ```
//!
//! The whole file is SQLCipher-encrypted with the master passphrase. Field
//! encryption happens one layer up; this type only ever sees `FieldCipher`
//! output for the protected columns.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, OpenFlags};
use tracing::{debug, info, warn};

use crate::aliases::MasterPassphrase;
use crate::consts::{DB_CIPHER_PAGE_SIZE, DB_KDF_ITERATIONS, SCHEMA_VERSION};
use crate::crypto::FieldCipher;
use crate::db::vault_db_ops::{self as ops, SecretMode};
use crate::error::{CoreError, CoreResult};
use crate::record::Credential;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Closed,
    Open,
    Unlocked,
}

/// Aggregate numbers for the status view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStats {
    pub total: i64,
    pub favorites: i64,
    pub categories: i64,
    pub file_size: u64,
    pub path: PathBuf,
}

pub struct CredentialStore {
    pub(crate) path: PathBuf,
    pub(crate) conn: Option<Connection>,
    pub(crate) passphrase: Option<MasterPassphrase>,
    pub(crate) in_transaction: bool,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            path: PathBuf::new(),
            conn: None,
            passphrase: None,
            in_transaction: false,
        }
    }

    pub fn state(&self) -> StoreState {
        match (&self.conn, &self.passphrase) {
            (None, _) => StoreState::Closed,
            (Some(_), None) => StoreState::Open,
            (Some(_), Some(_)) => StoreState::Unlocked,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Open (or create) the backing file. The connection stays unkeyed
    /// until a passphrase is set or verified.
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        if self.state() != StoreState::Closed {
            self.close();
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        self.path = path.to_path_buf();
        self.conn = Some(conn);
        info!(path = %path.display(), "vault file opened");
        Ok(())
    }

    /// A vault counts as initialised once its file holds any pages
    pub fn is_initialized(&self) -> bool {
        !self.path.as_os_str().is_empty()
            && fs::metadata(&self.path)
                .map(|m| m.len() > 0)
                .unwrap_or(false)
    }

    pub fn set_passphrase(&mut self, passphrase: &str) -> CoreResult<()> {
        self.set_passphrase_with(passphrase, |_| Ok(()))
    }

    /// Key a brand-new file, create the schema and let `seed` write the
    /// vault-level config rows, all in one transaction.
    pub fn set_passphrase_with<F>(&mut self, passphrase: &str, seed: F) -> CoreResult<()>
    where
        F: FnOnce(&Connection) -> CoreResult<()>,
    {
        if passphrase.is_empty() {
            return Err(CoreError::InvalidArgument(
                "master passphrase cannot be empty".into(),
            ));
        }
        if self.state() == StoreState::Closed {
            return Err(CoreError::NotInitialized);
        }
        if self.is_initialized() {
            return Err(CoreError::AlreadyInitialized);
        }

        let result = self.initialize(passphrase, seed);
        if let Err(e) = &result {
            warn!(error = %e, "vault initialisation failed, discarding new file");
            self.conn = None;
            let _ = fs::remove_file(&self.path);
            self.conn = Some(Connection::open(&self.path)?);
        }
        result
    }

    fn initialize<F>(&mut self, passphrase: &str, seed: F) -> CoreResult<()>
    where
        F: FnOnce(&Connection) -> CoreResult<()>,
    {
        // The unkeyed connection must not touch the file before keying
        self.conn = None;
        let mut conn = Connection::open(&self.path)?;
        apply_key(&conn, passphrase).map_err(|e| CoreError::Crypto(e.to_string()))?;

        let tx = conn.transaction()?;
        ops::create_schema(&tx)?;
        ops::set_schema_version(&tx, SCHEMA_VERSION)?;
        seed(&tx)?;
        tx.commit()?;

        self.conn = Some(conn);
        self.passphrase = Some(MasterPassphrase::new(passphrase.to_string()));
        info!(path = %self.path.display(), "vault initialised");
        Ok(())
    }

    /// Probe the file with `passphrase` on a throwaway read-only connection.
    /// A wrong passphrase is `Ok(false)`.
    pub fn verify_passphrase(&self, passphrase: &str) -> CoreResult<bool> {
        if self.state() == StoreState::Closed {
            return Err(CoreError::NotInitialized);
        }
        if passphrase.is_empty() || !self.is_initialized() {
            return Ok(false);
        }
        match open_keyed(&self.path, passphrase, true) {
            Ok(_) => Ok(true),
            Err(e) if is_wrong_key(&e) => {
                debug!("passphrase probe rejected");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verify and, on success, replace the live connection with a keyed one
    pub fn unlock(&mut self, passphrase: &str) -> CoreResult<bool> {
        if !self.verify_passphrase(passphrase)? {
            return Ok(false);
        }
        if self.in_transaction {
            return Err(CoreError::InvalidArgument(
                "cannot re-key while a transaction is open".into(),
            ));
        }

        self.conn = None;
        let conn = match open_keyed(&self.path, passphrase, false) {
            Ok(conn) => conn,
            Err(e) => {
                self.conn = Some(Connection::open(&self.path)?);
                return Err(e.into());
            }
        };
        if let Err(e) = ops::upgrade_schema(&conn) {
            drop(conn);
            self.conn = Some(Connection::open(&self.path)?);
            return Err(e.into());
        }
        self.conn = Some(conn);
        self.passphrase = Some(MasterPassphrase::new(passphrase.to_string()));
        info!("vault unlocked");
        Ok(true)
    }

    /// Drop the keyed connection and the held passphrase; the file stays open
    pub fn lock(&mut self) -> CoreResult<()> {
        if self.state() != StoreState::Unlocked {
            return Ok(());
        }
        self.abort_open_transaction();
        self.passphrase = None;
        self.conn = None;
        self.conn = Some(Connection::open(&self.path)?);
        info!("vault locked");
        Ok(())
    }

    pub fn close(&mut self) {
        self.abort_open_transaction();
        self.passphrase = None;
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                warn!(error = %e, "vault connection did not close cleanly");
            }
            info!(path = %self.path.display(), "vault file closed");
        }
    }

    pub(crate) fn conn(&self) -> CoreResult<&Connection> {
        match (&self.conn, &self.passphrase) {
            (Some(conn), Some(_)) => Ok(conn),
            _ => Err(CoreError::NotInitialized),
        }
    }

    pub(crate) fn passphrase(&self) -> CoreResult<&MasterPassphrase> {
        self.passphrase.as_ref().ok_or(CoreError::NotInitialized)
    }

    // ── transactions ────────────────────────────────────────────────

    pub fn begin_transaction(&mut self) -> CoreResult<()> {
        if self.in_transaction {
            return Err(CoreError::InvalidArgument(
                "a transaction is already open".into(),
            ));
        }
        self.conn()?.execute_batch("BEGIN IMMEDIATE")?;
        self.in_transaction = true;
        debug!("transaction started");
        Ok(())
    }

    pub fn commit(&mut self) -> CoreResult<()> {
        if !self.in_transaction {
            return Err(CoreError::InvalidArgument("no open transaction".into()));
        }
        self.conn()?.execute_batch("COMMIT")?;
        self.in_transaction = false;
        debug!("transaction committed");
        Ok(())
    }

    pub fn rollback(&mut self) -> CoreResult<()> {
        if !self.in_transaction {
            return Err(CoreError::InvalidArgument("no open transaction".into()));
        }
        // The flag clears even if ROLLBACK fails: SQLite has already ended
        // the transaction in every case where it reports an error here.
        self.in_transaction = false;
        self.conn()?.execute_batch("ROLLBACK")?;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Run `f` inside a transaction that always ends in commit or rollback
    pub fn transaction<T, F>(&mut self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Self) -> CoreResult<T>,
    {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => match self.commit() {
                Ok(()) => Ok(value),
                Err(e) => {
                    self.abort_open_transaction();
                    Err(e)
                }
            },
            Err(e) => {
                self.abort_open_transaction();
                Err(e)
            }
        }
    }

    pub(crate) fn abort_open_transaction(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.rollback() {
                warn!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }

    // ── records ─────────────────────────────────────────────────────

    pub fn create(&self, cred: &Credential, cipher: &FieldCipher) -> CoreResult<i64> {
        cred.validate()?;
        let id = ops::insert_credential(self.conn()?, cred, cipher)?;
        debug!(id, "record inserted");
        Ok(id)
    }

    /// `Ok(false)` when no row has that id
    pub fn update(&self, cred: &Credential, cipher: &FieldCipher) -> CoreResult<bool> {
        cred.validate()?;
        let id = cred.id().ok_or_else(|| {
            CoreError::InvalidArgument("record has not been saved yet".into())
        })?;
        ops::update_credential(self.conn()?, id, cred, cipher)
    }

    pub fn delete(&self, id: i64) -> CoreResult<bool> {
        Ok(ops::delete_credential(self.conn()?, id)?)
    }

    pub fn get_by_id(&self, id: i64, cipher: &FieldCipher) -> CoreResult<Option<Credential>> {
        ops::fetch_by_id(self.conn()?, id, cipher)
    }

    pub fn get_all(&self, cipher: &FieldCipher) -> CoreResult<Vec<Credential>> {
        ops::fetch_all(self.conn()?, cipher, SecretMode::Decrypt)
    }

    /// Like `get_all`, but the secret column is never decrypted
    pub fn get_all_redacted(&self, cipher: &FieldCipher) -> CoreResult<Vec<Credential>> {
        ops::fetch_all(self.conn()?, cipher, SecretMode::Redact)
    }

    pub fn search(&self, term: &str, cipher: &FieldCipher) -> CoreResult<Vec<Credential>> {
        ops::search(self.conn()?, term, cipher)
    }

    pub fn get_by_category(
        &self,
        category: &str,
        cipher: &FieldCipher,
    ) -> CoreResult<Vec<Credential>> {
        ops::fetch_by_category(self.conn()?, category, cipher)
    }

    pub fn get_favorites(&self, cipher: &FieldCipher) -> CoreResult<Vec<Credential>> {
        ops::fetch_favorites(self.conn()?, cipher)
    }

    pub fn categories(&self) -> CoreResult<Vec<String>> {
        Ok(ops::categories(self.conn()?)?)
    }

    pub fn clear_all(&self) -> CoreResult<usize> {
        let removed = ops::clear_all(self.conn()?)?;
        info!(removed, "all records deleted");
        Ok(removed)
    }

    pub fn stats(&self) -> CoreResult<VaultStats> {
        let (total, favorites, categories) = ops::counts(self.conn()?)?;
        let file_size = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(VaultStats {
            total,
            favorites,
            categories,
            file_size,
            path: self.path.clone(),
        })
    }

    pub fn compact(&self) -> CoreResult<()> {
        if self.in_transaction {
            return Err(CoreError::InvalidArgument(
                "cannot compact while a transaction is open".into(),
            ));
        }
        self.conn()?.execute_batch("VACUUM")?;
        info!("vault compacted");
        Ok(())
    }

    /// Never errors: a locked store or a failing check both read as unhealthy
    pub fn integrity_check(&self) -> bool {
        let healthy = self
            .conn()
            .ok()
            .map(|conn| ops::integrity_check(conn).unwrap_or(false))
            .unwrap_or(false);
        if !healthy {
            warn!(path = %self.path.display(), "integrity check failed");
        }
        healthy
    }

    pub(crate) fn read_config(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(ops::read_config(self.conn()?, key)?)
    }
}

impl Drop for CredentialStore {
    fn drop(&mut self) {
        self.abort_open_transaction();
    }
}

/// Key a fresh connection. SQLCipher 4 parameters are pinned explicitly so
/// that attached databases created with the same defaults stay compatible.
pub(crate) fn apply_key(conn: &Connection, passphrase: &str) -> rusqlite::Result<()> {
    conn.pragma_update(None, "key", passphrase)?;
    conn.execute_batch(&format!(
        r#"
        PRAGMA cipher_page_size = {DB_CIPHER_PAGE_SIZE};
        PRAGMA kdf_iter = {DB_KDF_ITERATIONS};
        PRAGMA cipher_hmac_algorithm = HMAC_SHA512;
        PRAGMA cipher_kdf_algorithm = PBKDF2_HMAC_SHA512;
        "#
    ))
}

/// Open `path` keyed with `passphrase` and prove the key with a trivial read
pub(crate) fn open_keyed(
    path: &Path,
    passphrase: &str,
    read_only: bool,
) -> rusqlite::Result<Connection> {
    let conn = if read_only {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?
    } else {
        Connection::open(path)?
    };
    apply_key(&conn, passphrase)?;
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(conn)
}

/// SQLCipher reports a wrong key (or a non-vault file) as SQLITE_NOTADB
pub(crate) fn is_wrong_key(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::NotADatabase
    )
}
