// src/record.rs
//! The credential record held in the vault

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};

use crate::error::{CoreError, CoreResult};

/// One stored credential.
///
/// `username`, `secret` and `notes` are encrypted at rest; everything else is
/// stored in plaintext columns so it can be filtered without decryption.
/// Every setter that changes a value refreshes `updated_at`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    id: Option<i64>,
    title: String,
    username: String,
    secret: String,
    website: String,
    notes: String,
    category: String,
    is_favorite: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Protected fields are never printed, only whether they are set
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &str| if value.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("username", &redact(self.username.as_str()))
            .field("secret", &redact(self.secret.as_str()))
            .field("website", &self.website)
            .field("notes", &redact(self.notes.as_str()))
            .field("category", &self.category)
            .field("is_favorite", &self.is_favorite)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Second precision, matching what the ISO-8601 interchange formats keep
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

impl Credential {
    pub fn new(
        title: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
        website: impl Into<String>,
        notes: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let created_at = now();
        Self {
            id: None,
            title: title.into(),
            username: username.into(),
            secret: secret.into(),
            website: website.into(),
            notes: notes.into(),
            category: category.into(),
            is_favorite: false,
            created_at,
            updated_at: created_at,
        }
    }

    /// Rebuild a record exactly as persisted (no timestamp refresh)
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: i64,
        title: String,
        username: String,
        secret: String,
        website: String,
        notes: String,
        category: String,
        is_favorite: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            title,
            username,
            secret,
            website,
            notes,
            category,
            is_favorite,
            created_at,
            updated_at,
        }
    }

    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.is_favorite = favorite;
        self
    }

    /// Override both timestamps, e.g. when importing. `updated_at` is clamped
    /// so it never precedes `created_at`.
    pub fn with_timestamps(
        mut self,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at.max(created_at);
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn username(&self) -> &str {
        &self.username
    }
    pub fn secret(&self) -> &str {
        &self.secret
    }
    pub fn website(&self) -> &str {
        &self.website
    }
    pub fn notes(&self) -> &str {
        &self.notes
    }
    pub fn category(&self) -> &str {
        &self.category
    }
    pub fn is_favorite(&self) -> bool {
        self.is_favorite
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Ids are assigned once by the store and never change afterwards
    pub(crate) fn assign_id(&mut self, id: i64) -> CoreResult<()> {
        match self.id {
            Some(existing) if existing != id => Err(CoreError::InvalidArgument(format!(
                "record already has id {existing}"
            ))),
            _ => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now().max(self.created_at);
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if self.title != title {
            self.title = title;
            self.touch();
        }
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        let username = username.into();
        if self.username != username {
            self.username = username;
            self.touch();
        }
    }

    pub fn set_secret(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        if self.secret != secret {
            self.secret = secret;
            self.touch();
        }
    }

    pub fn set_website(&mut self, website: impl Into<String>) {
        let website = website.into();
        if self.website != website {
            self.website = website;
            self.touch();
        }
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        let notes = notes.into();
        if self.notes != notes {
            self.notes = notes;
            self.touch();
        }
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        let category = category.into();
        if self.category != category {
            self.category = category;
            self.touch();
        }
    }

    pub fn set_favorite(&mut self, favorite: bool) {
        if self.is_favorite != favorite {
            self.is_favorite = favorite;
            self.touch();
        }
    }

    /// Title non-blank and secret non-empty
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.title.trim().is_empty() {
            return Err(CoreError::Validation("Password title cannot be empty".into()));
        }
        if self.secret.is_empty() {
            return Err(CoreError::Validation("Password cannot be empty".into()));
        }
        Ok(())
    }

    /// Case-insensitive match over title, username, website, notes and category
    pub fn matches(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let term = term.to_lowercase();
        [
            &self.title,
            &self.username,
            &self.website,
            &self.notes,
            &self.category,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_or_empty_secret_is_invalid() {
        assert!(!Credential::new("   ", "u", "s", "", "", "").is_valid());
        assert!(!Credential::new("Mail", "u", "", "", "", "").is_valid());
        assert!(Credential::new("Mail", "", "s", "", "", "").is_valid());
    }

    #[test]
    fn setters_refresh_updated_at_but_not_created_at() {
        let past = Utc::now().trunc_subsecs(0) - chrono::Duration::days(3);
        let mut cred = Credential::new("Mail", "u", "s", "", "", "").with_timestamps(past, past);

        cred.set_notes("rotated");

        assert_eq!(cred.created_at(), past);
        assert!(cred.updated_at() > past);
    }

    #[test]
    fn unchanged_value_does_not_touch_timestamp() {
        let past = Utc::now().trunc_subsecs(0) - chrono::Duration::days(1);
        let mut cred = Credential::new("Mail", "u", "s", "", "", "").with_timestamps(past, past);

        cred.set_title("Mail");

        assert_eq!(cred.updated_at(), past);
    }

    #[test]
    fn search_matches_case_insensitively() {
        let cred = Credential::new("GitHub", "octo@example.com", "pw", "github.com", "", "Dev");
        assert!(cred.matches("OCTO"));
        assert!(cred.matches("dev"));
        assert!(!cred.matches("gitlab"));
    }

    #[test]
    fn debug_output_hides_protected_fields() {
        let cred = Credential::new("Mail", "alice@example.com", "hunter2", "mail.example.com", "pin 1234", "");
        let printed = format!("{cred:?}");

        assert!(printed.contains("Mail"));
        assert!(printed.contains("mail.example.com"));
        assert!(!printed.contains("alice@example.com"));
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("pin 1234"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn with_timestamps_clamps_updated_before_created() {
        let created = Utc::now().trunc_subsecs(0);
        let earlier = created - chrono::Duration::hours(1);
        let cred = Credential::new("a", "", "b", "", "", "").with_timestamps(created, earlier);
        assert_eq!(cred.updated_at(), created);
    }
}
