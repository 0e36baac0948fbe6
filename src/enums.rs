// src/enums.rs
//! Public enum types used throughout the crate
//!
//! Central location for the #[derive(...)] enums that represent
//! user-visible choices: interchange formats, list ordering.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Import/export interchange formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Json,
    Csv,
}

impl DataFormat {
    /// Guess from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(DataFormat::Json),
            "csv" => Some(DataFormat::Csv),
            _ => None,
        }
    }
}

/// Column the visible list is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Title,
    Category,
    CreatedAt,
    #[default]
    UpdatedAt,
    Favorite,
}
