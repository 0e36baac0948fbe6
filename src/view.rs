// src/view.rs
//! In-memory filtered and sorted projection of the decrypted records
//!
//! Filters combine: a record is visible when it matches the search term,
//! the category (if one is set) and the favourites switch.

use std::cmp::Ordering;

use crate::enums::SortKey;
use crate::record::Credential;

#[derive(Debug, Clone)]
pub struct RecordView {
    records: Vec<Credential>,
    search: String,
    category: Option<String>,
    favorites_only: bool,
    sort: SortKey,
    ascending: bool,
}

impl Default for RecordView {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            search: String::new(),
            category: None,
            favorites_only: false,
            sort: SortKey::UpdatedAt,
            ascending: false,
        }
    }
}

impl RecordView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a fresh snapshot; filters and ordering are kept
    pub fn replace(&mut self, records: Vec<Credential>) {
        self.records = records;
    }

    /// Forget the decrypted snapshot (on lock)
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.trim().to_string();
    }

    /// Empty name removes the category filter
    pub fn set_category(&mut self, name: &str) {
        self.category = (!name.is_empty()).then(|| name.to_string());
    }

    pub fn set_favorites_only(&mut self, on: bool) {
        self.favorites_only = on;
    }

    pub fn clear_filters(&mut self) {
        self.search.clear();
        self.category = None;
        self.favorites_only = false;
    }

    pub fn sort_by(&mut self, key: SortKey, ascending: bool) {
        self.sort = key;
        self.ascending = ascending;
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    fn is_visible(&self, cred: &Credential) -> bool {
        cred.matches(&self.search)
            && self
                .category
                .as_deref()
                .map_or(true, |c| cred.category() == c)
            && (!self.favorites_only || cred.is_favorite())
    }

    fn compare(&self, a: &Credential, b: &Credential) -> Ordering {
        let primary = match self.sort {
            SortKey::Title => a.title().to_lowercase().cmp(&b.title().to_lowercase()),
            SortKey::Category => a
                .category()
                .to_lowercase()
                .cmp(&b.category().to_lowercase()),
            SortKey::CreatedAt => a.created_at().cmp(&b.created_at()),
            SortKey::UpdatedAt => a.updated_at().cmp(&b.updated_at()),
            SortKey::Favorite => a.is_favorite().cmp(&b.is_favorite()),
        };
        let primary = if self.ascending {
            primary
        } else {
            primary.reverse()
        };
        primary.then_with(|| a.title().cmp(b.title()))
    }

    /// Snapshot of what passes the filters, in display order
    pub fn visible(&self) -> Vec<Credential> {
        let mut out: Vec<Credential> = self
            .records
            .iter()
            .filter(|c| self.is_visible(c))
            .cloned()
            .collect();
        out.sort_by(|a, b| self.compare(a, b));
        out
    }
}
