// src/export/mod.rs
//! Import/export interchange for passvault
//!
//! Supports two formats: JSON and CSV. Exports with secrets are plaintext
//! by nature; callers gate them behind `features.allow_insecure_export`.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::consts::HIDDEN_SECRET_MARKER;
use crate::enums::DataFormat;
use crate::error::{CoreError, CoreResult};
use crate::record::{now, Credential};

pub mod csv;
pub mod json;

/// One entry read from an import file, before it becomes a `Credential`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportEntry {
    pub title: String,
    pub username: String,
    pub password: String,
    pub website: String,
    pub notes: String,
    pub category: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_favorite: bool,
}

impl ImportEntry {
    /// Redacted entries from an export without secrets
    pub fn is_hidden(&self) -> bool {
        self.password == HIDDEN_SECRET_MARKER
    }

    /// Timestamps from the file win when present; anything missing falls
    /// back to now, and `updated_at` never precedes `created_at`.
    pub fn into_credential(self) -> Credential {
        let created = self.created_at.unwrap_or_else(now);
        let updated = self.updated_at.unwrap_or(created);
        Credential::new(
            self.title,
            self.username,
            self.password,
            self.website,
            self.notes,
            self.category,
        )
        .with_favorite(self.is_favorite)
        .with_timestamps(created, updated)
    }
}

/// Parsed import file
#[derive(Debug, Default)]
pub struct ParsedImport {
    pub entries: Vec<ImportEntry>,
    /// Rows the parser could not map to an entry at all
    pub malformed: usize,
}

pub fn encode(
    records: &[Credential],
    format: DataFormat,
    include_secrets: bool,
) -> CoreResult<String> {
    match format {
        DataFormat::Json => json::encode(records, include_secrets),
        DataFormat::Csv => Ok(csv::encode(records, include_secrets)),
    }
}

pub fn decode(text: &str, format: DataFormat) -> CoreResult<ParsedImport> {
    match format {
        DataFormat::Json => json::decode(text),
        DataFormat::Csv => csv::decode(text),
    }
}

/// Explicit format, or the one implied by the file extension
pub fn resolve_format(path: &Path, format: Option<DataFormat>) -> CoreResult<DataFormat> {
    format
        .or_else(|| DataFormat::from_path(path))
        .ok_or_else(|| {
            CoreError::InvalidArgument(format!(
                "cannot tell the format of {}; use .json or .csv",
                path.display()
            ))
        })
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// RFC 3339, or a bare `YYYY-MM-DDTHH:MM:SS` read as UTC
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|n| n.and_utc()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc()))
        .ok()
}

/// Write next to `path` then rename over it, so a failed export never
/// leaves a half-written file behind.
pub fn write_atomic(path: &Path, contents: &str) -> CoreResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".passvault-export-")
        .tempfile_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_accept_offset_and_naive_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn missing_updated_falls_back_to_created() {
        let created = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let entry = ImportEntry {
            title: "t".into(),
            password: "p".into(),
            created_at: Some(created),
            ..Default::default()
        };
        let cred = entry.into_credential();
        assert_eq!(cred.created_at(), created);
        assert_eq!(cred.updated_at(), created);
    }
}
