//! tests/db_tests.rs

mod common;
use common::{sample, same_content, PASS};

use passvault::aliases::FieldKey32;
use passvault::crypto::FieldCipher;
use passvault::db::{CredentialStore, StoreState};
use passvault::error::CoreError;
use passvault::Credential;
use rusqlite::Connection;
use std::fs;
use tempfile::TempDir;

fn cipher() -> FieldCipher {
    FieldCipher::new(FieldKey32::new([7u8; 32]))
}

fn unlocked_store() -> (TempDir, CredentialStore) {
    common::setup();
    let dir = tempfile::tempdir().unwrap();
    let mut store = CredentialStore::new();
    store.open_file(dir.path().join("vault.db")).unwrap();
    store.set_passphrase(PASS).unwrap();
    (dir, store)
}

#[test]
fn open_file_creates_missing_directories() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b").join("vault.db");

    let mut store = CredentialStore::new();
    assert_eq!(store.state(), StoreState::Closed);
    store.open_file(&nested).unwrap();

    assert_eq!(store.state(), StoreState::Open);
    assert!(nested.parent().unwrap().is_dir());
    assert!(!store.is_initialized());
}

#[test]
fn state_machine_unlock_lock_close() {
    let (_dir, mut store) = unlocked_store();
    assert_eq!(store.state(), StoreState::Unlocked);

    store.lock().unwrap();
    assert_eq!(store.state(), StoreState::Open);
    assert!(matches!(store.get_all(&cipher()), Err(CoreError::NotInitialized)));

    assert!(store.unlock(PASS).unwrap());
    assert_eq!(store.state(), StoreState::Unlocked);

    store.close();
    assert_eq!(store.state(), StoreState::Closed);
    assert!(matches!(
        store.verify_passphrase(PASS),
        Err(CoreError::NotInitialized)
    ));
}

#[test]
fn verify_passphrase_is_boolean() {
    let (_dir, mut store) = unlocked_store();
    assert!(store.verify_passphrase(PASS).unwrap());
    assert!(!store.verify_passphrase("not it").unwrap());
    assert!(!store.verify_passphrase("").unwrap());

    store.lock().unwrap();
    assert!(!store.unlock("not it").unwrap());
    assert_eq!(store.state(), StoreState::Open);
}

#[test]
fn second_set_passphrase_is_refused() {
    let (dir, mut store) = unlocked_store();
    assert!(matches!(
        store.set_passphrase("another"),
        Err(CoreError::AlreadyInitialized)
    ));

    // A fresh handle on the same file sees it as initialised too
    drop(store);
    let mut again = CredentialStore::new();
    again.open_file(dir.path().join("vault.db")).unwrap();
    assert!(again.is_initialized());
    assert!(matches!(
        again.set_passphrase("another"),
        Err(CoreError::AlreadyInitialized)
    ));
}

#[test]
fn wrong_passphrase_cannot_read_the_file() {
    let (dir, store) = unlocked_store();
    store.create(&sample("Mail"), &cipher()).unwrap();
    drop(store);

    let conn = Connection::open(dir.path().join("vault.db")).unwrap();
    conn.pragma_update(None, "key", "wrong").unwrap();
    assert!(conn
        .query_row("SELECT count(*) FROM credentials", [], |r| r.get::<_, i64>(0))
        .is_err());
}

#[test]
fn plaintext_never_reaches_disk() {
    let (dir, store) = unlocked_store();
    let cred = Credential::new("Bank", "alice", "zebra-unique-secret", "", "pin 4321", "");
    store.create(&cred, &cipher()).unwrap();
    drop(store);

    let bytes = fs::read(dir.path().join("vault.db")).unwrap();
    let haystack = String::from_utf8_lossy(&bytes);
    assert!(!haystack.contains("zebra-unique-secret"));
    assert!(!haystack.contains("Bank"));
}

#[test]
fn protected_columns_hold_ciphertext() {
    let (_dir, store) = unlocked_store();
    let cred = Credential::new("Bank", "alice", "zebra", "bank.example", "pin", "Finance");
    store.create(&cred, &cipher()).unwrap();

    let mut second = CredentialStore::new();
    second.open_file(store.path()).unwrap();
    assert!(second.unlock(PASS).unwrap());
    // Reading with a different field key must fail, not return garbage
    let other = FieldCipher::new(FieldKey32::new([8u8; 32]));
    assert!(matches!(
        second.get_all(&other),
        Err(CoreError::DecryptionFailed)
    ));
}

#[test]
fn create_then_get_by_id_roundtrips() {
    let (_dir, store) = unlocked_store();
    let cred = sample("GitHub").with_favorite(true);

    let id = store.create(&cred, &cipher()).unwrap();
    let fetched = store.get_by_id(id, &cipher()).unwrap().unwrap();

    assert!(id > 0);
    assert_eq!(fetched.id(), Some(id));
    assert!(same_content(&cred, &fetched));
    assert_eq!(fetched.created_at(), cred.created_at());
    assert_eq!(fetched.updated_at(), cred.updated_at());
}

#[test]
fn invalid_records_are_not_persisted() {
    let (_dir, store) = unlocked_store();
    let blank = Credential::new("  ", "", "pw", "", "", "");
    assert!(matches!(
        store.create(&blank, &cipher()),
        Err(CoreError::Validation(_))
    ));
    assert!(store.get_all(&cipher()).unwrap().is_empty());
}

#[test]
fn update_and_delete_report_missing_rows() {
    let (_dir, store) = unlocked_store();
    let c = cipher();
    let id = store.create(&sample("Mail"), &c).unwrap();

    let mut cred = store.get_by_id(id, &c).unwrap().unwrap();
    cred.set_secret("rotated");
    assert!(store.update(&cred, &c).unwrap());
    assert_eq!(store.get_by_id(id, &c).unwrap().unwrap().secret(), "rotated");

    assert!(store.delete(id).unwrap());
    assert!(store.get_by_id(id, &c).unwrap().is_none());
    assert!(!store.delete(id).unwrap());
    assert!(!store.update(&cred, &c).unwrap());
}

#[test]
fn unsaved_record_cannot_be_updated() {
    let (_dir, store) = unlocked_store();
    assert!(matches!(
        store.update(&sample("New"), &cipher()),
        Err(CoreError::InvalidArgument(_))
    ));
}

#[test]
fn search_looks_inside_decrypted_fields() {
    let (_dir, store) = unlocked_store();
    let c = cipher();
    store
        .create(&Credential::new("Router", "admin", "pw", "192.168.0.1", "closet shelf", "Home"), &c)
        .unwrap();
    store
        .create(&Credential::new("Mail", "someone", "pw", "mail.example", "", "Work"), &c)
        .unwrap();

    assert_eq!(store.search("CLOSET", &c).unwrap().len(), 1);
    assert_eq!(store.search("admin", &c).unwrap()[0].title(), "Router");
    assert_eq!(store.search("work", &c).unwrap()[0].title(), "Mail");
    assert_eq!(store.search("", &c).unwrap().len(), 2);
    assert!(store.search("nothing-like-this", &c).unwrap().is_empty());
}

#[test]
fn category_and_favorite_queries() {
    let (_dir, store) = unlocked_store();
    let c = cipher();
    for (title, category, fav) in [
        ("b-bank", "Finance", true),
        ("a-broker", "Finance", false),
        ("mail", "Personal", true),
        ("misc", "", false),
    ] {
        let cred = Credential::new(title, "", "pw", "", "", category).with_favorite(fav);
        store.create(&cred, &c).unwrap();
    }

    let finance: Vec<String> = store
        .get_by_category("Finance", &c)
        .unwrap()
        .iter()
        .map(|r| r.title().to_string())
        .collect();
    assert_eq!(finance, ["a-broker", "b-bank"]);
    assert_eq!(store.get_favorites(&c).unwrap().len(), 2);
    assert_eq!(store.categories().unwrap(), ["Finance", "Personal"]);

    let stats = store.stats().unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.favorites, 2);
    assert_eq!(stats.categories, 2);
    assert!(stats.file_size > 0);
}

#[test]
fn redacted_read_hides_only_the_secret() {
    let (_dir, store) = unlocked_store();
    let c = cipher();
    store.create(&sample("Mail"), &c).unwrap();

    let redacted = store.get_all_redacted(&c).unwrap();
    assert_eq!(redacted[0].secret(), passvault::consts::HIDDEN_SECRET_MARKER);
    assert_eq!(redacted[0].username(), "mail@example.com");
}

#[test]
fn explicit_transactions_commit_and_roll_back() {
    let (_dir, mut store) = unlocked_store();
    let c = cipher();

    store.begin_transaction().unwrap();
    assert!(matches!(
        store.begin_transaction(),
        Err(CoreError::InvalidArgument(_))
    ));
    store.create(&sample("Gone"), &c).unwrap();
    store.rollback().unwrap();
    assert!(store.get_all(&c).unwrap().is_empty());

    store.begin_transaction().unwrap();
    store.create(&sample("Kept"), &c).unwrap();
    store.commit().unwrap();
    assert_eq!(store.get_all(&c).unwrap().len(), 1);

    assert!(matches!(store.commit(), Err(CoreError::InvalidArgument(_))));
}

#[test]
fn transaction_closure_rolls_back_on_error() {
    let (_dir, mut store) = unlocked_store();
    let c = cipher();

    let result: Result<(), CoreError> = store.transaction(|s| {
        s.create(&sample("One"), &c)?;
        s.create(&Credential::new("", "", "", "", "", ""), &c)?;
        Ok(())
    });

    assert!(matches!(result, Err(CoreError::Validation(_))));
    assert!(!store.in_transaction());
    assert!(store.get_all(&c).unwrap().is_empty());
}

#[test]
fn clear_all_removes_everything() {
    let (_dir, store) = unlocked_store();
    let c = cipher();
    for t in ["a", "b", "c"] {
        store.create(&sample(t), &c).unwrap();
    }
    assert_eq!(store.clear_all().unwrap(), 3);
    assert!(store.get_all(&c).unwrap().is_empty());
}

#[test]
fn integrity_check_never_errors() {
    let (_dir, mut store) = unlocked_store();
    assert!(store.integrity_check());
    store.compact().unwrap();
    assert!(store.integrity_check());

    store.lock().unwrap();
    assert!(!store.integrity_check());
}

#[test]
fn get_all_orders_most_recent_first() {
    let (_dir, store) = unlocked_store();
    let c = cipher();
    let old = chrono::Utc::now() - chrono::Duration::days(10);
    let old = chrono::DateTime::from_timestamp(old.timestamp(), 0).unwrap();
    store
        .create(&sample("Old").with_timestamps(old, old), &c)
        .unwrap();
    store.create(&sample("New"), &c).unwrap();

    let titles: Vec<String> = store
        .get_all(&c)
        .unwrap()
        .iter()
        .map(|r| r.title().to_string())
        .collect();
    assert_eq!(titles, ["New", "Old"]);
}

#[test]
fn store_level_change_passphrase_rejects_wrong_old() {
    let (_dir, mut store) = unlocked_store();
    assert!(!store.change_passphrase("nope", "next").unwrap());
    assert!(store.verify_passphrase(PASS).unwrap());
}

#[test]
fn store_level_change_passphrase_rekeys_file() {
    let (_dir, mut store) = unlocked_store();
    let c = cipher();
    let id = store.create(&sample("Mail"), &c).unwrap();

    assert!(store.change_passphrase(PASS, "next one").unwrap());

    assert!(!store.verify_passphrase(PASS).unwrap());
    assert!(store.verify_passphrase("next one").unwrap());
    assert_eq!(store.state(), StoreState::Unlocked);
    assert_eq!(store.get_by_id(id, &c).unwrap().unwrap().title(), "Mail");
}
