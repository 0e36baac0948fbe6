// src/export/json.rs
//! JSON interchange
//!
//! ```json
//! { "passwords": [ { "title": "...", "password": "...", "createdAt": "...", ... } ],
//!   "exportDate": "...", "includePasswords": true, "totalCount": 1 }
//! ```
//!
//! Readers also accept `created_at` / `updated_at` keys.

use serde::{Deserialize, Serialize};

use super::{format_timestamp, parse_timestamp, ImportEntry, ParsedImport};
use crate::consts::HIDDEN_SECRET_MARKER;
use crate::error::{CoreError, CoreResult};
use crate::record::{now, Credential};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    passwords: Vec<JsonEntry<'a>>,
    export_date: String,
    include_passwords: bool,
    total_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonEntry<'a> {
    title: &'a str,
    username: &'a str,
    password: &'a str,
    website: &'a str,
    notes: &'a str,
    category: &'a str,
    created_at: String,
    updated_at: String,
    is_favorite: bool,
}

#[derive(Debug, Deserialize)]
struct ImportDocument {
    #[serde(default)]
    passwords: Vec<ImportedJsonEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ImportedJsonEntry {
    title: String,
    username: String,
    password: String,
    website: String,
    notes: String,
    category: String,
    #[serde(alias = "created_at")]
    created_at: String,
    #[serde(alias = "updated_at")]
    updated_at: String,
    #[serde(alias = "is_favorite")]
    is_favorite: bool,
}

pub fn encode(records: &[Credential], include_secrets: bool) -> CoreResult<String> {
    let passwords: Vec<JsonEntry<'_>> = records
        .iter()
        .map(|cred| JsonEntry {
            title: cred.title(),
            username: cred.username(),
            password: if include_secrets {
                cred.secret()
            } else {
                HIDDEN_SECRET_MARKER
            },
            website: cred.website(),
            notes: cred.notes(),
            category: cred.category(),
            created_at: format_timestamp(cred.created_at()),
            updated_at: format_timestamp(cred.updated_at()),
            is_favorite: cred.is_favorite(),
        })
        .collect();

    let doc = ExportDocument {
        total_count: passwords.len(),
        passwords,
        export_date: format_timestamp(now()),
        include_passwords: include_secrets,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn decode(text: &str) -> CoreResult<ParsedImport> {
    let doc: ImportDocument = serde_json::from_str(text)?;
    if doc.passwords.is_empty() {
        return Err(CoreError::Format("no passwords found in JSON file".into()));
    }

    let entries = doc
        .passwords
        .into_iter()
        .map(|e| ImportEntry {
            created_at: parse_timestamp(&e.created_at),
            updated_at: parse_timestamp(&e.updated_at),
            title: e.title,
            username: e.username,
            password: e.password,
            website: e.website,
            notes: e.notes,
            category: e.category,
            is_favorite: e.is_favorite,
        })
        .collect();

    Ok(ParsedImport {
        entries,
        malformed: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_uses_camel_case_and_metadata() {
        let cred = Credential::new("Mail", "me", "pw", "mail.example", "", "Home").with_favorite(true);
        let text = encode(&[cred], false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["totalCount"], 1);
        assert_eq!(value["includePasswords"], false);
        assert!(value["exportDate"].is_string());
        let entry = &value["passwords"][0];
        assert_eq!(entry["password"], HIDDEN_SECRET_MARKER);
        assert_eq!(entry["isFavorite"], true);
        assert!(entry["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn snake_case_timestamps_are_accepted() {
        let text = r#"{"passwords":[{"title":"a","password":"b",
            "created_at":"2022-05-01T08:00:00Z","updated_at":"2022-06-01T08:00:00Z"}]}"#;
        let parsed = decode(text).unwrap();
        let entry = &parsed.entries[0];
        assert!(entry.created_at.is_some());
        assert!(entry.updated_at > entry.created_at);
    }

    #[test]
    fn empty_or_invalid_documents_are_format_errors() {
        assert!(matches!(decode(r#"{"passwords":[]}"#), Err(CoreError::Format(_))));
        assert!(matches!(decode("{not json"), Err(CoreError::Format(_))));
    }
}
