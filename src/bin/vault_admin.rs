// src/bin/vault_admin.rs
//! vault-admin: bootstrap and maintenance for a passvault file
//!
//! Uses the configured vault (`PASSVAULT_CONFIG` / `PASSVAULT_DB`) and
//! prompts for passphrases on the terminal.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use passvault::{load_config, VaultService};
use rpassword::prompt_password;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: vault-admin <command> [args]

commands:
  init                          set the master password of a new vault
  verify                        check a master password
  change-passphrase             re-key the vault
  list                          list titles, categories and favourites
  export <file> [--no-secrets]  write JSON or CSV (by extension)
  import <file> [--replace]     read JSON or CSV; merges unless --replace
  backup <file>                 verified copy of the vault file
  restore <file>                replace the vault with a backup
  check                         integrity check and statistics";

fn unlock(service: &mut VaultService) -> Result<()> {
    if !service.has_passphrase() {
        bail!("no vault at {}; run `vault-admin init` first", service.path().display());
    }
    let pass = prompt_password("Master password: ")?;
    if !service.verify_passphrase(&pass)? {
        bail!("wrong master password");
    }
    Ok(())
}

fn new_passphrase() -> Result<String> {
    let first = prompt_password("New master password: ")?;
    let second = prompt_password("Repeat new master password: ")?;
    if first != second {
        bail!("passwords do not match");
    }
    Ok(first)
}

fn path_arg(args: &[String]) -> Result<PathBuf> {
    args.first()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("missing file argument\n\n{USAGE}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{USAGE}");
        return Ok(());
    };
    let has_flag = |flag: &str| rest.iter().any(|a| a == flag);

    let config = load_config().context("failed to load configuration")?;
    let mut service = VaultService::open(config).context("failed to open vault file")?;

    match command.as_str() {
        "init" => {
            if service.has_passphrase() {
                bail!("vault at {} is already initialised", service.path().display());
            }
            service.set_passphrase(&new_passphrase()?)?;
            println!("Vault created at {}", service.path().display());
        }
        "verify" => {
            unlock(&mut service)?;
            println!("Master password OK");
        }
        "change-passphrase" => {
            unlock(&mut service)?;
            let old = prompt_password("Current master password (again): ")?;
            let new = new_passphrase()?;
            if !service.change_passphrase(&old, &new)? {
                bail!("current master password is wrong");
            }
            println!("Master password changed");
        }
        "list" => {
            unlock(&mut service)?;
            for cred in service.all()? {
                println!(
                    "{:>5}  {}{}  [{}]",
                    cred.id().unwrap_or_default(),
                    if cred.is_favorite() { "* " } else { "" },
                    cred.title(),
                    cred.category()
                );
            }
        }
        "export" => {
            let path = path_arg(rest)?;
            unlock(&mut service)?;
            let count = service
                .export_records(&path, None, !has_flag("--no-secrets"))
                .with_context(|| format!("export to {} failed", path.display()))?;
            println!("Exported {count} record(s) to {}", path.display());
        }
        "import" => {
            let path = path_arg(rest)?;
            unlock(&mut service)?;
            let summary = service
                .import_records(&path, None, !has_flag("--replace"))
                .with_context(|| format!("import from {} failed", path.display()))?;
            println!(
                "Imported {} record(s), skipped {}",
                summary.imported, summary.skipped
            );
        }
        "backup" => {
            let path = path_arg(rest)?;
            unlock(&mut service)?;
            let report = service.backup(&path)?;
            println!(
                "Backup written to {} ({} bytes, blake3 {})",
                report.path.display(),
                report.bytes,
                report.checksum
            );
        }
        "restore" => {
            let path = path_arg(rest)?;
            unlock(&mut service)?;
            service
                .restore(&path)
                .with_context(|| format!("restore from {} failed", path.display()))?;
            println!("Vault restored from {}", path.display());
        }
        "check" => {
            unlock(&mut service)?;
            let healthy = service.integrity_check();
            let stats = service.stats()?;
            println!("path:        {}", stats.path.display());
            println!("size:        {} bytes", stats.file_size);
            println!("records:     {}", stats.total);
            println!("favourites:  {}", stats.favorites);
            println!("categories:  {}", stats.categories);
            println!("integrity:   {}", if healthy { "ok" } else { "FAILED" });
            if !healthy {
                bail!("integrity check failed");
            }
        }
        other => bail!("unknown command `{other}`\n\n{USAGE}"),
    }

    info!(command = %command, "done");
    Ok(())
}
