// src/config/defaults.rs
use std::path::PathBuf;

use crate::config::app::{Features, Paths, Security};
use crate::consts::{APP_DIR_NAME, DEFAULT_DB_FILENAME, DEFAULT_FIELD_KDF_ITERATIONS};

/// `<data dir>/passvault/passwords.db`, or `./passwords.db` when the platform has no data dir
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DB_FILENAME)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

pub fn default_paths() -> Paths {
    Paths {
        database: default_database_path(),
    }
}

pub fn default_security() -> Security {
    Security {
        kdf_iterations: DEFAULT_FIELD_KDF_ITERATIONS,
    }
}

pub fn default_features() -> Features {
    Features {
        allow_insecure_export: true,
    }
}
