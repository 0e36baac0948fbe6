// src/db/backup.rs
//! Whole-file operations: verified backup, crash-safe restore and the
//! staged passphrase change.
//!
//! All three follow the same shape: build the new file next to its final
//! location in a temp file, check it, then `persist` (atomic rename). The
//! live vault is only replaced once the replacement is known good.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::aliases::MasterPassphrase;
use crate::db::vault_db_conn::{open_keyed, CredentialStore, StoreState};
use crate::db::vault_db_ops as ops;
use crate::error::{CoreError, CoreResult};

/// What a successful backup wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub path: PathBuf,
    pub bytes: u64,
    /// BLAKE3 hex digest shared by the live file and the copy
    pub checksum: String,
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn digest_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Copy `src` into a synced temp file inside `dir`
fn copy_to_temp(src: &Path, dir: &Path, prefix: &str) -> io::Result<(NamedTempFile, u64)> {
    let mut tmp = tempfile::Builder::new().prefix(prefix).tempfile_in(dir)?;
    let bytes = io::copy(&mut File::open(src)?, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    Ok((tmp, bytes))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl CredentialStore {
    /// Copy the vault file to `dest`.
    ///
    /// Refused while a transaction is open: outside one, the rollback journal
    /// is gone and the main file is complete.
    pub fn backup(&self, dest: impl AsRef<Path>) -> CoreResult<BackupReport> {
        let dest = dest.as_ref();
        if self.state() == StoreState::Closed {
            return Err(CoreError::NotInitialized);
        }
        if self.in_transaction {
            return Err(CoreError::InvalidArgument(
                "cannot back up while a transaction is open".into(),
            ));
        }
        if same_file(dest, &self.path) {
            return Err(CoreError::InvalidArgument(
                "backup destination is the live vault file".into(),
            ));
        }

        let dir = parent_dir(dest);
        fs::create_dir_all(dir)?;
        let (tmp, bytes) = copy_to_temp(&self.path, dir, ".passvault-backup-")?;

        let source = digest_file(&self.path)?;
        let copy = digest_file(tmp.path())?;
        if source != copy {
            error!(dest = %dest.display(), "backup copy does not match the vault file");
            return Err(CoreError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "backup copy does not match the vault file",
            )));
        }

        tmp.persist(dest).map_err(|e| e.error)?;
        info!(dest = %dest.display(), bytes, checksum = %source.to_hex(), "backup written");
        Ok(BackupReport {
            path: dest.to_path_buf(),
            bytes,
            checksum: source.to_hex().to_string(),
        })
    }

    pub fn restore(&mut self, src: impl AsRef<Path>) -> CoreResult<()> {
        self.restore_with(src, |_| Ok(()))
    }

    /// Install `src` as the live vault, reopen it with the current
    /// passphrase and run `check` against it. Any failure reinstates the
    /// previous file; if even that fails, the safety copy is kept on disk
    /// and its location is reported.
    pub fn restore_with<F>(&mut self, src: impl AsRef<Path>, check: F) -> CoreResult<()>
    where
        F: FnOnce(&CredentialStore) -> CoreResult<()>,
    {
        let src = src.as_ref();
        if self.in_transaction {
            return Err(CoreError::InvalidArgument(
                "cannot restore while a transaction is open".into(),
            ));
        }
        let held = MasterPassphrase::new(self.passphrase()?.expose_secret().clone());
        if !src.is_file() {
            return Err(CoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("backup not found: {}", src.display()),
            )));
        }
        if same_file(src, &self.path) {
            return Err(CoreError::InvalidArgument(
                "backup source is the live vault file".into(),
            ));
        }

        let dir = parent_dir(&self.path).to_path_buf();
        let (safety, _) = copy_to_temp(&self.path, &dir, ".passvault-safety-")?;
        self.close();

        let failure = match self.install(src, &dir, held.expose_secret(), check) {
            Ok(()) => {
                info!(src = %src.display(), "vault restored from backup");
                return Ok(());
            }
            Err(e) => e,
        };

        warn!(error = %failure, "restore rejected, reinstating previous vault");
        self.close();
        if let Err(persist) = safety.persist(&self.path) {
            let kept = persist
                .file
                .keep()
                .map(|(_, path)| path.display().to_string())
                .unwrap_or_else(|_| "<unavailable>".into());
            error!(error = %persist.error, kept = %kept, "could not reinstate previous vault");
            return Err(CoreError::RestoreFailed(format!(
                "{failure}; previous vault kept at {kept}"
            )));
        }
        self.reopen(held.expose_secret())?;
        Err(CoreError::RestoreFailed(failure.to_string()))
    }

    fn install<F>(&mut self, src: &Path, dir: &Path, passphrase: &str, check: F) -> CoreResult<()>
    where
        F: FnOnce(&CredentialStore) -> CoreResult<()>,
    {
        let (incoming, _) = copy_to_temp(src, dir, ".passvault-restore-")?;
        incoming.persist(&self.path).map_err(|e| e.error)?;

        self.reopen(passphrase)?;
        if !self.integrity_check() {
            return Err(CoreError::Validation(
                "backup failed the integrity check".into(),
            ));
        }
        ops::counts(self.conn()?)?;
        check(self)
    }

    fn reopen(&mut self, passphrase: &str) -> CoreResult<()> {
        let conn = open_keyed(&self.path, passphrase, false)?;
        ops::upgrade_schema(&conn)?;
        self.conn = Some(conn);
        self.passphrase = Some(MasterPassphrase::new(passphrase.to_string()));
        Ok(())
    }

    pub fn change_passphrase(&mut self, old: &str, new: &str) -> CoreResult<bool> {
        self.change_passphrase_with(old, new, |_| Ok(()))
    }

    /// Re-key the vault file from `old` to `new`.
    ///
    /// The file is exported into a staging copy keyed with `new`; `stage`
    /// then runs inside one transaction on that copy (field re-encryption,
    /// new salt and token). Only a fully staged copy replaces the live file.
    /// Returns `Ok(false)` if `old` is wrong.
    pub fn change_passphrase_with<F>(&mut self, old: &str, new: &str, stage: F) -> CoreResult<bool>
    where
        F: FnOnce(&Connection) -> CoreResult<()>,
    {
        if self.state() != StoreState::Unlocked {
            return Err(CoreError::NotInitialized);
        }
        if new.is_empty() {
            return Err(CoreError::InvalidArgument(
                "master passphrase cannot be empty".into(),
            ));
        }
        if self.in_transaction {
            return Err(CoreError::InvalidArgument(
                "cannot change passphrase while a transaction is open".into(),
            ));
        }
        if !self.verify_passphrase(old)? {
            return Ok(false);
        }

        let dir = parent_dir(&self.path).to_path_buf();
        let staging = tempfile::Builder::new()
            .prefix(".passvault-rekey-")
            .suffix(".db")
            .tempfile_in(&dir)?;

        {
            let source = open_keyed(&self.path, old, false)?;
            let staging_path = staging.path().to_string_lossy().into_owned();
            source.execute(
                "ATTACH DATABASE ?1 AS rekey KEY ?2",
                params![staging_path, new],
            )?;
            source.query_row("SELECT sqlcipher_export('rekey')", [], |_| Ok(()))?;
            source.execute_batch("DETACH DATABASE rekey")?;
        }
        {
            let mut staged = open_keyed(staging.path(), new, false)?;
            let tx = staged.transaction()?;
            stage(&tx)?;
            tx.commit()?;
        }
        staging.as_file().sync_all()?;

        self.close();
        if let Err(e) = staging.persist(&self.path) {
            error!(error = %e.error, "could not install re-keyed vault, keeping old passphrase");
            self.reopen(old)?;
            return Err(e.error.into());
        }
        self.reopen(new)?;
        info!("vault passphrase changed");
        Ok(true)
    }
}
