// tests/config_tests.rs
use passvault::config::{self, Config, CONFIG_ENV, DB_PATH_ENV};
use passvault::consts::{DEFAULT_DB_FILENAME, DEFAULT_FIELD_KDF_ITERATIONS};
use passvault::error::CoreError;
use std::path::PathBuf;

#[test]
fn full_file_is_parsed() {
    let conf = Config::from_toml_str(
        r#"
        [paths]
        database = "/tmp/pv/test.db"

        [security]
        kdf_iterations = 200000

        [features]
        allow_insecure_export = false
        "#,
    )
    .unwrap();

    assert_eq!(conf.paths.database, PathBuf::from("/tmp/pv/test.db"));
    assert_eq!(conf.security.kdf_iterations, 200_000);
    assert!(!conf.features.allow_insecure_export);
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let conf = Config::from_toml_str("").unwrap();
    assert_eq!(conf.security.kdf_iterations, DEFAULT_FIELD_KDF_ITERATIONS);
    assert!(conf.features.allow_insecure_export);
    assert!(conf.paths.database.ends_with(DEFAULT_DB_FILENAME));
}

#[test]
fn weak_kdf_setting_is_a_config_error() {
    let err = Config::from_toml_str("[security]\nkdf_iterations = 1000\n").unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
}

#[test]
fn broken_toml_is_a_config_error() {
    assert!(matches!(
        Config::from_toml_str("[paths\ndatabase = "),
        Err(CoreError::Config(_))
    ));
}

// The only test in this binary that touches the environment
#[test]
fn env_overrides_file_and_database_path() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");
    std::fs::write(
        &file,
        "[paths]\ndatabase = \"from-file.db\"\n[security]\nkdf_iterations = 50000\n",
    )
    .unwrap();

    std::env::set_var(CONFIG_ENV, &file);
    std::env::remove_var(DB_PATH_ENV);
    let from_file = config::load().unwrap();
    assert_eq!(from_file.paths.database, PathBuf::from("from-file.db"));
    assert_eq!(from_file.security.kdf_iterations, 50_000);

    std::env::set_var(DB_PATH_ENV, dir.path().join("override.db"));
    let overridden = config::load().unwrap();
    assert_eq!(overridden.paths.database, dir.path().join("override.db"));

    std::env::set_var(CONFIG_ENV, dir.path().join("absent.toml"));
    let defaults = config::load().unwrap();
    assert_eq!(defaults.security.kdf_iterations, DEFAULT_FIELD_KDF_ITERATIONS);

    std::env::remove_var(CONFIG_ENV);
    std::env::remove_var(DB_PATH_ENV);
}
