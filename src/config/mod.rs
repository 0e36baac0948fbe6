// src/config/mod.rs
//! Configuration system for passvault
//!
//! TOML file + env overrides, loaded explicitly by the caller.

pub use app::{load, Config, Features, Paths, Security, CONFIG_ENV, DB_PATH_ENV};
pub use defaults::{default_config_path, default_database_path};

mod app;
mod defaults;
