// tests/common.rs
//! Shared test utilities: logging setup and throwaway vaults
#![allow(dead_code)] // each test binary uses a different subset

use std::path::Path;

use passvault::consts::MIN_FIELD_KDF_ITERATIONS;
use passvault::{Config, Credential, VaultService};
use tempfile::TempDir;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const PASS: &str = "correct horse battery staple";

/// Initialize test-friendly logging
/// Call once at the start of any test that needs logs
pub fn setup() {
    #[cfg(feature = "logging")]
    tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env()) // respects RUST_LOG=
        .try_init()
        .ok(); // idempotent

    #[cfg(not(feature = "logging"))]
    { /* no-op */ }
}

/// Vault file inside `dir`, cheapest allowed KDF so tests stay fast
pub fn config_in(dir: &Path) -> Config {
    let mut config = Config::for_database(dir.join("vault.db"));
    config.security.kdf_iterations = MIN_FIELD_KDF_ITERATIONS;
    config
}

/// Fresh vault with `PASS` set and unlocked
pub fn unlocked_vault() -> (TempDir, VaultService) {
    setup();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = VaultService::open(config_in(dir.path())).expect("open vault");
    service.set_passphrase(PASS).expect("set passphrase");
    (dir, service)
}

/// Close and reopen the same vault file, still locked
pub fn reopen(dir: &TempDir, service: VaultService) -> VaultService {
    drop(service);
    VaultService::open(config_in(dir.path())).expect("reopen vault")
}

pub fn sample(title: &str) -> Credential {
    Credential::new(
        title,
        format!("{}@example.com", title.to_lowercase()),
        format!("s3cret-{title}"),
        format!("https://{}.example.com", title.to_lowercase()),
        format!("notes for {title}"),
        "General",
    )
}

/// Save `n` sample records and return their ids
pub fn seed(service: &mut VaultService, titles: &[&str]) -> Vec<i64> {
    titles
        .iter()
        .map(|t| service.save(&mut sample(t)).expect("save sample"))
        .collect()
}

/// Field-for-field equality ignoring id
pub fn same_content(a: &Credential, b: &Credential) -> bool {
    a.title() == b.title()
        && a.username() == b.username()
        && a.secret() == b.secret()
        && a.website() == b.website()
        && a.notes() == b.notes()
        && a.category() == b.category()
        && a.is_favorite() == b.is_favorite()
}
