//! Record and vault-config operations on an unlocked connection
//!
//! Free functions over `&Connection` so they work equally on the live
//! vault, inside a `Transaction`, or on a staged re-key copy.
//! Protected columns (`username`, `secret`, `notes`) only ever hold
//! `FieldCipher` output; every statement is parameterized.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use tracing::warn;

use crate::consts::{HIDDEN_SECRET_MARKER, SCHEMA_VERSION};
use crate::crypto::FieldCipher;
use crate::error::CoreResult;
use crate::record::Credential;

const SELECT_CREDENTIALS: &str = "SELECT id, title, username, secret, website, notes, category,
            created_at, updated_at, is_favorite
     FROM credentials";

/// How the `secret` column is treated when reading rows back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretMode {
    Decrypt,
    /// Never decrypt the secret; substitute the hidden-marker instead
    Redact,
}

/// Create the records table, the schema-version table, the vault-level
/// config table and the query indexes.
pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS credentials (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            username    TEXT NOT NULL DEFAULT '',
            secret      TEXT NOT NULL,
            website     TEXT NOT NULL DEFAULT '',
            notes       TEXT NOT NULL DEFAULT '',
            category    TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            is_favorite INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS vault_config (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_credentials_title       ON credentials(title);
        CREATE INDEX IF NOT EXISTS idx_credentials_category    ON credentials(category);
        CREATE INDEX IF NOT EXISTS idx_credentials_updated_at  ON credentials(updated_at);
        CREATE INDEX IF NOT EXISTS idx_credentials_is_favorite ON credentials(is_favorite);
        "#,
    )
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(None);
    }
    conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })
    .optional()
}

/// Keep exactly one row in `schema_version`
pub fn set_schema_version(conn: &Connection, version: i64) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        params![version],
    )?;
    Ok(())
}

/// Bring an opened vault up to `SCHEMA_VERSION`. Newer files are left alone.
pub fn upgrade_schema(conn: &Connection) -> rusqlite::Result<()> {
    match schema_version(conn)? {
        None => {
            create_schema(conn)?;
            set_schema_version(conn, SCHEMA_VERSION)
        }
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(v) if v > SCHEMA_VERSION => {
            warn!(
                found = v,
                expected = SCHEMA_VERSION,
                "vault schema is newer than this build; continuing read-compatible"
            );
            Ok(())
        }
        Some(_) => {
            // Only one version exists so far; future migrations slot in here
            create_schema(conn)?;
            set_schema_version(conn, SCHEMA_VERSION)
        }
    }
}

/// Row exactly as stored: protected fields still encrypted
struct StoredRow {
    id: i64,
    title: String,
    username: String,
    secret: String,
    website: String,
    notes: String,
    category: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    is_favorite: bool,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            username: row.get(2)?,
            secret: row.get(3)?,
            website: row.get(4)?,
            notes: row.get(5)?,
            category: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            is_favorite: row.get(9)?,
        })
    }

    fn decrypt(self, cipher: &FieldCipher, mode: SecretMode) -> CoreResult<Credential> {
        let secret = match mode {
            SecretMode::Decrypt => cipher.decrypt(&self.secret)?,
            SecretMode::Redact => HIDDEN_SECRET_MARKER.to_string(),
        };
        Ok(Credential::from_parts(
            self.id,
            self.title,
            cipher.decrypt(&self.username)?,
            secret,
            self.website,
            cipher.decrypt(&self.notes)?,
            self.category,
            self.is_favorite,
            self.created_at,
            self.updated_at,
        ))
    }
}

fn query_credentials<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    cipher: &FieldCipher,
    mode: SecretMode,
) -> CoreResult<Vec<Credential>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, StoredRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter()
        .map(|row| row.decrypt(cipher, mode))
        .collect()
}

/// Insert a new row and return the id SQLite assigned
pub fn insert_credential(
    conn: &Connection,
    cred: &Credential,
    cipher: &FieldCipher,
) -> CoreResult<i64> {
    conn.execute(
        "INSERT INTO credentials (
            title, username, secret, website, notes, category,
            created_at, updated_at, is_favorite
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            cred.title(),
            cipher.encrypt(cred.username())?,
            cipher.encrypt(cred.secret())?,
            cred.website(),
            cipher.encrypt(cred.notes())?,
            cred.category(),
            cred.created_at(),
            cred.updated_at(),
            cred.is_favorite(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrite every mutable column of row `id`. `created_at` is never touched.
pub fn update_credential(
    conn: &Connection,
    id: i64,
    cred: &Credential,
    cipher: &FieldCipher,
) -> CoreResult<bool> {
    let changed = conn.execute(
        "UPDATE credentials
         SET title = ?1, username = ?2, secret = ?3, website = ?4, notes = ?5,
             category = ?6, updated_at = ?7, is_favorite = ?8
         WHERE id = ?9",
        params![
            cred.title(),
            cipher.encrypt(cred.username())?,
            cipher.encrypt(cred.secret())?,
            cred.website(),
            cipher.encrypt(cred.notes())?,
            cred.category(),
            cred.updated_at(),
            cred.is_favorite(),
            id,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_credential(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM credentials WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

pub fn fetch_by_id(
    conn: &Connection,
    id: i64,
    cipher: &FieldCipher,
) -> CoreResult<Option<Credential>> {
    let row = conn
        .query_row(
            &format!("{SELECT_CREDENTIALS} WHERE id = ?1"),
            params![id],
            StoredRow::from_row,
        )
        .optional()?;
    row.map(|r| r.decrypt(cipher, SecretMode::Decrypt))
        .transpose()
}

/// Most recently updated first
pub fn fetch_all(
    conn: &Connection,
    cipher: &FieldCipher,
    mode: SecretMode,
) -> CoreResult<Vec<Credential>> {
    query_credentials(
        conn,
        &format!("{SELECT_CREDENTIALS} ORDER BY updated_at DESC, id DESC"),
        [],
        cipher,
        mode,
    )
}

pub fn fetch_by_category(
    conn: &Connection,
    category: &str,
    cipher: &FieldCipher,
) -> CoreResult<Vec<Credential>> {
    query_credentials(
        conn,
        &format!("{SELECT_CREDENTIALS} WHERE category = ?1 ORDER BY title, id"),
        params![category],
        cipher,
        SecretMode::Decrypt,
    )
}

pub fn fetch_favorites(conn: &Connection, cipher: &FieldCipher) -> CoreResult<Vec<Credential>> {
    query_credentials(
        conn,
        &format!("{SELECT_CREDENTIALS} WHERE is_favorite = 1 ORDER BY title, id"),
        [],
        cipher,
        SecretMode::Decrypt,
    )
}

/// Case-insensitive search over title, website, category and the decrypted
/// username and notes. Every row has to be decrypted: protected fields are
/// never indexed in plaintext.
pub fn search(conn: &Connection, term: &str, cipher: &FieldCipher) -> CoreResult<Vec<Credential>> {
    let mut all = fetch_all(conn, cipher, SecretMode::Decrypt)?;
    all.retain(|cred| cred.matches(term));
    Ok(all)
}

pub fn categories(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT category FROM credentials WHERE category != '' ORDER BY category",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

pub fn clear_all(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM credentials", [])
}

/// (total, favorites, distinct non-empty categories)
pub fn counts(conn: &Connection) -> rusqlite::Result<(i64, i64, i64)> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(is_favorite), 0),
                COUNT(DISTINCT NULLIF(category, ''))
         FROM credentials",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
}

pub fn read_config(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM vault_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn write_config(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO vault_config (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Re-encrypt every protected column from `from` to `to`.
/// Timestamps are left as they are: the records themselves did not change.
pub fn reencrypt_all(conn: &Connection, from: &FieldCipher, to: &FieldCipher) -> CoreResult<usize> {
    let rows = {
        let mut stmt = conn.prepare("SELECT id, username, secret, notes FROM credentials")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    let mut update =
        conn.prepare("UPDATE credentials SET username = ?1, secret = ?2, notes = ?3 WHERE id = ?4")?;
    for (id, username, secret, notes) in &rows {
        update.execute(params![
            to.encrypt(&from.decrypt(username)?)?,
            to.encrypt(&from.decrypt(secret)?)?,
            to.encrypt(&from.decrypt(notes)?)?,
            id,
        ])?;
    }
    Ok(rows.len())
}

/// `PRAGMA integrity_check` reports exactly one row, `ok`, when healthy
pub fn integrity_check(conn: &Connection) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare("PRAGMA integrity_check")?;
    let results = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(results.len() == 1 && results[0] == "ok")
}
