// src/service.rs
//! Vault orchestration: passphrase lifecycle, validated record lifecycle,
//! filtered views and the bulk import/export pipelines.
//!
//! `VaultService` owns the only `FieldCipher`. The store never sees the
//! derived key; it gets the cipher borrowed per call.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::consts::{
    CONFIG_KEY_ITERATIONS, CONFIG_KEY_SALT, CONFIG_KEY_TOKEN, VERIFICATION_PLAINTEXT,
};
use crate::crypto::{FieldCipher, KeyDerivation};
use crate::db::vault_db_ops as ops;
use crate::db::{BackupReport, CredentialStore, StoreState, VaultStats};
use crate::enums::{DataFormat, SortKey};
use crate::error::{CoreError, CoreResult};
use crate::events::{ChangeListener, Listeners, VaultEvent};
use crate::export;
use crate::record::Credential;
use crate::view::RecordView;

/// Outcome of `import_records`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Hidden, invalid or malformed entries
    pub skipped: usize,
}

/// Fresh key material for a new or re-keyed vault
struct KeyMaterial {
    cipher: FieldCipher,
    salt: String,
    token: String,
    iterations: u32,
}

impl KeyMaterial {
    fn generate(passphrase: &str, iterations: u32) -> CoreResult<Self> {
        let kdf = KeyDerivation::new(iterations)?;
        let salt = KeyDerivation::generate_salt();
        let cipher = FieldCipher::new(kdf.derive(passphrase, &salt)?);
        let token = cipher.encrypt(VERIFICATION_PLAINTEXT)?;
        Ok(Self {
            cipher,
            salt: STANDARD.encode(salt),
            token,
            iterations,
        })
    }

    fn write(&self, conn: &Connection) -> CoreResult<()> {
        ops::write_config(conn, CONFIG_KEY_SALT, &self.salt)?;
        ops::write_config(conn, CONFIG_KEY_TOKEN, &self.token)?;
        ops::write_config(conn, CONFIG_KEY_ITERATIONS, &self.iterations.to_string())?;
        Ok(())
    }
}

/// Rebuild the field cipher from the salt stored in the vault and check it
/// against the verification token. `Ok(None)` means the token did not open.
fn derive_cipher(store: &CredentialStore, passphrase: &str) -> CoreResult<Option<FieldCipher>> {
    let missing = |what: &str| CoreError::Crypto(format!("vault has no {what}"));

    let salt = store
        .read_config(CONFIG_KEY_SALT)?
        .ok_or_else(|| missing("key salt"))?;
    let salt = STANDARD
        .decode(salt)
        .map_err(|e| CoreError::Crypto(format!("stored salt is not base64: {e}")))?;
    let iterations: u32 = store
        .read_config(CONFIG_KEY_ITERATIONS)?
        .ok_or_else(|| missing("KDF iteration count"))?
        .parse()
        .map_err(|_| CoreError::Crypto("stored KDF iteration count is not a number".into()))?;
    let token = store
        .read_config(CONFIG_KEY_TOKEN)?
        .ok_or_else(|| missing("verification token"))?;

    let cipher = FieldCipher::new(KeyDerivation::new(iterations)?.derive(passphrase, &salt)?);
    match cipher.decrypt(&token) {
        Ok(plain) if plain == VERIFICATION_PLAINTEXT => Ok(Some(cipher)),
        Ok(_) | Err(CoreError::DecryptionFailed) => Ok(None),
        Err(e) => Err(e),
    }
}

pub struct VaultService {
    config: Config,
    store: CredentialStore,
    cipher: Option<FieldCipher>,
    view: RecordView,
    listeners: Listeners,
    last_error: Option<String>,
}

impl VaultService {
    /// Open (or create) the vault file named by `config`. The vault starts locked.
    pub fn open(config: Config) -> CoreResult<Self> {
        config.validate()?;
        let mut store = CredentialStore::new();
        store.open_file(&config.paths.database)?;
        Ok(Self {
            config,
            store,
            cipher: None,
            view: RecordView::new(),
            listeners: Listeners::default(),
            last_error: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// User-facing text of the most recent failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn subscribe(&mut self, listener: impl ChangeListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn tracked<T>(&mut self, f: impl FnOnce(&mut Self) -> CoreResult<T>) -> CoreResult<T> {
        let result = f(self);
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                warn!(error = %e, "vault operation failed");
                self.last_error = Some(e.user_message());
            }
        }
        result
    }

    /// Roll back whatever transaction a panicking caller left open
    pub(crate) fn abort_pending(&mut self) {
        self.store.abort_open_transaction();
    }

    fn cipher(&self) -> CoreResult<&FieldCipher> {
        self.cipher.as_ref().ok_or(CoreError::NotInitialized)
    }

    fn refresh(&mut self) -> CoreResult<()> {
        let records = self.store.get_all(self.cipher()?)?;
        self.view.replace(records);
        Ok(())
    }

    // ── passphrase lifecycle ────────────────────────────────────────

    pub fn has_passphrase(&self) -> bool {
        self.store.is_initialized()
    }

    pub fn is_unlocked(&self) -> bool {
        self.cipher.is_some() && self.store.state() == StoreState::Unlocked
    }

    /// First-time setup: key the file and store salt, token and KDF rounds
    pub fn set_passphrase(&mut self, passphrase: &str) -> CoreResult<()> {
        self.tracked(|s| {
            if passphrase.is_empty() {
                return Err(CoreError::InvalidArgument(
                    "master passphrase cannot be empty".into(),
                ));
            }
            if s.has_passphrase() {
                return Err(CoreError::AlreadyInitialized);
            }
            let material = KeyMaterial::generate(passphrase, s.config.security.kdf_iterations)?;
            s.store
                .set_passphrase_with(passphrase, |conn| material.write(conn))?;
            s.cipher = Some(material.cipher);
            s.view.replace(Vec::new());
            info!(iterations = material.iterations, "master passphrase set");
            Ok(())
        })
    }

    /// Unlock with `passphrase`. A wrong passphrase is `Ok(false)`.
    pub fn verify_passphrase(&mut self, passphrase: &str) -> CoreResult<bool> {
        self.tracked(|s| {
            if !s.store.unlock(passphrase)? {
                info!("passphrase rejected");
                return Ok(false);
            }
            match derive_cipher(&s.store, passphrase)? {
                Some(cipher) => {
                    s.cipher = Some(cipher);
                    s.refresh()?;
                    Ok(true)
                }
                None => {
                    warn!("vault file opened but the verification token did not match");
                    s.cipher = None;
                    s.view.clear();
                    s.store.lock()?;
                    Ok(false)
                }
            }
        })
    }

    /// Drop the derived key and the decrypted snapshot
    pub fn lock(&mut self) -> CoreResult<()> {
        self.cipher = None;
        self.view.clear();
        self.store.lock()
    }

    /// Re-key the file and re-encrypt every record. `Ok(false)` if `old` is wrong.
    pub fn change_passphrase(&mut self, old: &str, new: &str) -> CoreResult<bool> {
        self.tracked(|s| {
            if new.is_empty() {
                return Err(CoreError::InvalidArgument(
                    "master passphrase cannot be empty".into(),
                ));
            }
            let from = s.cipher.as_ref().ok_or(CoreError::NotInitialized)?;
            let material = KeyMaterial::generate(new, s.config.security.kdf_iterations)?;

            let changed = s.store.change_passphrase_with(old, new, |conn| {
                let count = ops::reencrypt_all(conn, from, &material.cipher)?;
                material.write(conn)?;
                debug!(count, "records re-encrypted under the new key");
                Ok(())
            })?;
            if !changed {
                return Ok(false);
            }

            s.cipher = Some(material.cipher);
            s.refresh()?;
            s.listeners.emit(VaultEvent::PassphraseChanged);
            Ok(true)
        })
    }

    // ── records ─────────────────────────────────────────────────────

    /// Build an unsaved record; nothing is persisted
    pub fn create_record(
        &self,
        title: &str,
        username: &str,
        secret: &str,
        website: &str,
        notes: &str,
        category: &str,
    ) -> Credential {
        Credential::new(title, username, secret, website, notes, category)
    }

    /// Persist `cred`, assigning its id. Records that already have an id are
    /// updated; if that row is gone the save fails and nothing is written.
    pub fn save(&mut self, cred: &mut Credential) -> CoreResult<i64> {
        self.tracked(|s| {
            cred.validate()?;
            if let Some(id) = cred.id() {
                if !s.update_inner(cred)? {
                    return Err(CoreError::InvalidArgument(format!(
                        "record {id} no longer exists"
                    )));
                }
                return Ok(id);
            }
            let id = s.store.create(cred, s.cipher()?)?;
            cred.assign_id(id)?;
            s.refresh()?;
            s.listeners.emit(VaultEvent::Saved { id });
            Ok(id)
        })
    }

    /// `Ok(false)` if the record no longer exists
    pub fn update(&mut self, cred: &Credential) -> CoreResult<bool> {
        self.tracked(|s| {
            cred.validate()?;
            s.update_inner(cred)
        })
    }

    fn update_inner(&mut self, cred: &Credential) -> CoreResult<bool> {
        let updated = self.store.update(cred, self.cipher()?)?;
        if let (true, Some(id)) = (updated, cred.id()) {
            self.refresh()?;
            self.listeners.emit(VaultEvent::Updated { id });
        }
        Ok(updated)
    }

    /// `Ok(false)` for an unknown id
    pub fn delete(&mut self, id: i64) -> CoreResult<bool> {
        self.tracked(|s| {
            s.cipher()?;
            let deleted = s.store.delete(id)?;
            if deleted {
                s.refresh()?;
                s.listeners.emit(VaultEvent::Deleted { id });
            }
            Ok(deleted)
        })
    }

    pub fn get(&self, id: i64) -> CoreResult<Option<Credential>> {
        self.store.get_by_id(id, self.cipher()?)
    }

    /// Every record, most recently updated first
    pub fn all(&self) -> CoreResult<Vec<Credential>> {
        self.store.get_all(self.cipher()?)
    }

    pub fn clear_all(&mut self) -> CoreResult<usize> {
        self.tracked(|s| {
            s.cipher()?;
            let removed = s.store.clear_all()?;
            s.view.replace(Vec::new());
            s.listeners.emit(VaultEvent::Cleared { removed });
            Ok(removed)
        })
    }

    // ── view ────────────────────────────────────────────────────────

    pub fn search(&mut self, term: &str) -> CoreResult<Vec<Credential>> {
        self.cipher()?;
        self.view.set_search(term);
        Ok(self.view.visible())
    }

    /// Empty name shows every category
    pub fn filter_by_category(&mut self, name: &str) -> CoreResult<Vec<Credential>> {
        self.cipher()?;
        self.view.set_category(name);
        Ok(self.view.visible())
    }

    pub fn filter_favorites(&mut self, favorites_only: bool) -> CoreResult<Vec<Credential>> {
        self.cipher()?;
        self.view.set_favorites_only(favorites_only);
        Ok(self.view.visible())
    }

    pub fn clear_filters(&mut self) -> CoreResult<Vec<Credential>> {
        self.cipher()?;
        self.view.clear_filters();
        Ok(self.view.visible())
    }

    pub fn sort_by(&mut self, key: SortKey, ascending: bool) -> Vec<Credential> {
        self.view.sort_by(key, ascending);
        self.view.visible()
    }

    /// Current snapshot with filters and ordering applied
    pub fn visible(&self) -> Vec<Credential> {
        self.view.visible()
    }

    // ── maintenance ─────────────────────────────────────────────────

    pub fn categories(&self) -> CoreResult<Vec<String>> {
        self.store.categories()
    }

    pub fn stats(&self) -> CoreResult<VaultStats> {
        self.store.stats()
    }

    pub fn compact(&mut self) -> CoreResult<()> {
        self.tracked(|s| s.store.compact())
    }

    pub fn integrity_check(&self) -> bool {
        self.store.integrity_check()
    }

    pub fn backup(&mut self, dest: impl AsRef<Path>) -> CoreResult<BackupReport> {
        let dest = dest.as_ref();
        self.tracked(|s| s.store.backup(dest))
    }

    /// Replace the vault with `src`. The backup must open with the current
    /// passphrase; otherwise the current vault is kept.
    pub fn restore(&mut self, src: impl AsRef<Path>) -> CoreResult<()> {
        let src = src.as_ref();
        self.tracked(|s| {
            s.cipher()?;
            let mut restored = None;
            s.store.restore_with(src, |store| {
                let passphrase = store.passphrase()?.expose_secret();
                let cipher = derive_cipher(store, passphrase)?.ok_or_else(|| {
                    CoreError::Validation(
                        "backup was made with a different master password".into(),
                    )
                })?;
                restored = Some(cipher);
                Ok(())
            })?;

            s.cipher = restored;
            s.refresh()?;
            s.listeners.emit(VaultEvent::Restored);
            Ok(())
        })
    }

    // ── bulk import / export ────────────────────────────────────────

    /// Import from `path` in one transaction.
    ///
    /// Hidden and invalid entries are skipped and counted. With
    /// `merge == false` the existing records are cleared inside the same
    /// transaction, so a failed import leaves them untouched. Importing
    /// nothing rolls back and reports `NothingImported`.
    pub fn import_records(
        &mut self,
        path: impl AsRef<Path>,
        format: Option<DataFormat>,
        merge: bool,
    ) -> CoreResult<ImportSummary> {
        let path = path.as_ref();
        self.tracked(|s| {
            let cipher = s.cipher.as_ref().ok_or(CoreError::NotInitialized)?;
            let format = export::resolve_format(path, format)?;
            let text = fs::read_to_string(path)?;
            let parsed = export::decode(&text, format)?;

            let total = parsed.entries.len();
            let listeners = &s.listeners;
            let mut skipped = parsed.malformed;

            let imported = s.store.transaction(|store| {
                if !merge {
                    store.clear_all()?;
                }
                let mut imported = 0;
                for (done, entry) in parsed.entries.into_iter().enumerate() {
                    if entry.is_hidden() {
                        skipped += 1;
                    } else {
                        let cred = entry.into_credential();
                        if cred.is_valid() {
                            store.create(&cred, cipher)?;
                            imported += 1;
                        } else {
                            skipped += 1;
                        }
                    }
                    listeners.emit(VaultEvent::ImportProgress {
                        done: done + 1,
                        total,
                    });
                }
                if imported == 0 {
                    return Err(CoreError::NothingImported);
                }
                Ok(imported)
            })?;

            s.refresh()?;
            s.listeners.emit(VaultEvent::Imported { count: imported });
            info!(imported, skipped, path = %path.display(), "import finished");
            Ok(ImportSummary { imported, skipped })
        })
    }

    /// Export every record to `path`, written atomically.
    ///
    /// Without `include_secrets` the secret column is never decrypted and the
    /// redaction marker is written in its place.
    pub fn export_records(
        &mut self,
        path: impl AsRef<Path>,
        format: Option<DataFormat>,
        include_secrets: bool,
    ) -> CoreResult<usize> {
        let path = path.as_ref();
        self.tracked(|s| {
            if include_secrets && !s.config.features.allow_insecure_export {
                return Err(CoreError::InvalidArgument(
                    "exporting plaintext passwords is disabled in the configuration".into(),
                ));
            }
            let cipher = s.cipher()?;
            let format = export::resolve_format(path, format)?;
            let records = if include_secrets {
                s.store.get_all(cipher)?
            } else {
                s.store.get_all_redacted(cipher)?
            };

            let text = export::encode(&records, format, include_secrets)?;
            export::write_atomic(path, &text)?;
            if include_secrets {
                warn!(path = %path.display(), "export contains plaintext passwords");
            }
            info!(count = records.len(), path = %path.display(), "export written");
            Ok(records.len())
        })
    }
}

impl std::fmt::Debug for VaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultService")
            .field("path", &self.store.path())
            .field("unlocked", &self.is_unlocked())
            .field("listeners", &self.listeners)
            .finish()
    }
}
