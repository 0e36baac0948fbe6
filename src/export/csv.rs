// src/export/csv.rs
//! CSV interchange with RFC 4180 quoting
//!
//! Header: `Title,Username,Password,Website,Notes,Category,Created,Updated,Favorite`.
//! Quoted fields may span lines. Favorite is written `Yes`/`No` and read
//! back as true for `yes` or `true` in any case.

use tracing::warn;

use super::{format_timestamp, parse_timestamp, ImportEntry, ParsedImport};
use crate::consts::{CSV_HEADER, HIDDEN_SECRET_MARKER};
use crate::error::{CoreError, CoreResult};
use crate::record::Credential;

/// Fewer columns than this and a row cannot carry a usable entry
const MIN_FIELDS: usize = 6;

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let row: Vec<String> = fields.into_iter().map(escape).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

pub fn encode(records: &[Credential], include_secrets: bool) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADER);

    for cred in records {
        let created = format_timestamp(cred.created_at());
        let updated = format_timestamp(cred.updated_at());
        push_row(
            &mut out,
            [
                cred.title(),
                cred.username(),
                if include_secrets {
                    cred.secret()
                } else {
                    HIDDEN_SECRET_MARKER
                },
                cred.website(),
                cred.notes(),
                cred.category(),
                created.as_str(),
                updated.as_str(),
                if cred.is_favorite() { "Yes" } else { "No" },
            ],
        );
    }
    out
}

/// Split `text` into records of fields. Line breaks inside quotes are kept.
fn parse_rows(text: &str) -> CoreResult<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CoreError::Format("unterminated quoted CSV field".into()));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

pub fn decode(text: &str) -> CoreResult<ParsedImport> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut parsed = ParsedImport::default();

    // First row is always the header
    for (index, row) in parse_rows(text)?.into_iter().enumerate().skip(1) {
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if row.len() < MIN_FIELDS {
            warn!(row = index + 1, fields = row.len(), "skipping malformed CSV row");
            parsed.malformed += 1;
            continue;
        }

        let column = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
        let favorite = column(8).trim().to_ascii_lowercase();
        parsed.entries.push(ImportEntry {
            title: column(0).to_string(),
            username: column(1).to_string(),
            password: column(2).to_string(),
            website: column(3).to_string(),
            notes: column(4).to_string(),
            category: column(5).to_string(),
            created_at: parse_timestamp(column(6)),
            updated_at: parse_timestamp(column(7)),
            is_favorite: favorite == "yes" || favorite == "true",
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_follows_rfc4180() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn quoted_newlines_and_commas_survive_a_read() {
        let text = "Title,Username,Password,Website,Notes,Category\r\n\
                    \"Bank, main\",me,\"p\"\"w\",bank.example,\"line one\nline two\",Finance\r\n";
        let parsed = decode(text).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        let e = &parsed.entries[0];
        assert_eq!(e.title, "Bank, main");
        assert_eq!(e.password, "p\"w");
        assert_eq!(e.notes, "line one\nline two");
        assert!(!e.is_favorite);
    }

    #[test]
    fn favorite_column_is_case_insensitive() {
        let text = "h\na,,p,,,,,,YES\nb,,p,,,,,,True\nc,,p,,,,,,no\n";
        let favs: Vec<bool> = decode(text)
            .unwrap()
            .entries
            .iter()
            .map(|e| e.is_favorite)
            .collect();
        assert_eq!(favs, vec![true, true, false]);
    }

    #[test]
    fn short_rows_are_counted_not_imported() {
        let parsed = decode("h\nonly,three,fields\n\nok,,p,,,\n").unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.malformed, 1);
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        assert!(matches!(
            decode("h\n\"open,,p,,,\n"),
            Err(CoreError::Format(_))
        ));
    }
}
