// src/config/app.rs
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use super::defaults::*;
use crate::consts::MIN_FIELD_KDF_ITERATIONS;
use crate::error::{CoreError, CoreResult};

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "PASSVAULT_CONFIG";

/// Environment variable overriding `paths.database`
pub const DB_PATH_ENV: &str = "PASSVAULT_DB";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_paths")]
    pub paths: Paths,
    #[serde(default = "default_security")]
    pub security: Security,
    #[serde(default = "default_features")]
    pub features: Features,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    pub database: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
    pub kdf_iterations: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Features {
    pub allow_insecure_export: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            paths: default_paths(),
            security: default_security(),
            features: default_features(),
        }
    }
}

impl Config {
    /// Config for a vault file at `database`, everything else default
    pub fn for_database(database: impl Into<PathBuf>) -> Self {
        Config {
            paths: Paths {
                database: database.into(),
            },
            ..Config::default()
        }
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let conf: Config = toml::from_str(content)?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.security.kdf_iterations < MIN_FIELD_KDF_ITERATIONS {
            return Err(CoreError::Config(format!(
                "security.kdf_iterations must be at least {MIN_FIELD_KDF_ITERATIONS}, got {}",
                self.security.kdf_iterations
            )));
        }
        if self.paths.database.as_os_str().is_empty() {
            return Err(CoreError::Config("paths.database must not be empty".into()));
        }
        Ok(())
    }
}

/// Load config at runtime; a missing file means built-in defaults
pub fn load() -> CoreResult<Config> {
    let config_path = env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    let mut conf = if config_path.exists() {
        debug!(path = %config_path.display(), "loading configuration");
        Config::from_file(&config_path)?
    } else {
        warn!(
            path = %config_path.display(),
            "config file not found, using built-in defaults"
        );
        Config::default()
    };

    // Test isolation and ad-hoc vaults
    if let Some(db) = env::var_os(DB_PATH_ENV) {
        conf.paths.database = PathBuf::from(db);
    }

    Ok(conf)
}
