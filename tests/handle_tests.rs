// tests/handle_tests.rs
mod common;
use common::{sample, unlocked_vault};

use passvault::error::CoreError;
use passvault::VaultHandle;
use std::sync::mpsc;

#[test]
fn run_executes_on_the_calling_thread() {
    let (_dir, service) = unlocked_vault();
    let handle = VaultHandle::new(service);

    let id = handle.run(|svc| svc.save(&mut sample("Mail"))).unwrap();
    let fetched = handle.run(move |svc| svc.get(id)).unwrap();

    assert_eq!(fetched.unwrap().title(), "Mail");
    assert!(!handle.is_loading());
}

#[test]
fn second_operation_is_busy_while_one_is_in_flight() {
    let (_dir, service) = unlocked_vault();
    let handle = VaultHandle::new(service);
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let worker = handle
        .spawn(move |svc| {
            started_tx.send(()).ok();
            release_rx.recv().ok();
            svc.save(&mut sample("Slow"))
        })
        .unwrap();
    started_rx.recv().unwrap();

    assert!(handle.is_loading());
    assert!(matches!(
        handle.run(|svc| svc.all()),
        Err(CoreError::Busy)
    ));
    assert!(matches!(
        handle.spawn(|svc| svc.all()).map(|_| ()),
        Err(CoreError::Busy)
    ));

    release_tx.send(()).unwrap();
    let id = worker.join().unwrap().unwrap();
    assert!(id > 0);
    assert!(!handle.is_loading());
    assert_eq!(handle.run(|svc| svc.all()).unwrap().len(), 1);
}

#[test]
fn failed_operation_releases_the_flag() {
    let (_dir, service) = unlocked_vault();
    let handle = VaultHandle::new(service);

    let err = handle.run(|svc| svc.save(&mut sample(""))).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(!handle.is_loading());
    assert!(handle.run(|svc| svc.all()).is_ok());
}

#[test]
fn panicking_worker_does_not_wedge_the_vault() {
    let (_dir, service) = unlocked_vault();
    let handle = VaultHandle::new(service);

    let worker = handle
        .spawn(|_svc| -> Result<(), CoreError> { panic!("worker blew up") })
        .unwrap();
    assert!(worker.join().is_err());

    assert!(!handle.is_loading());
    assert!(handle.run(|svc| svc.all()).unwrap().is_empty());
}

#[test]
fn clones_share_the_same_guard() {
    let (_dir, service) = unlocked_vault();
    let handle = VaultHandle::new(service);
    let other = handle.clone();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel();

    let worker = handle
        .spawn(move |_svc| {
            started_tx.send(()).ok();
            release_rx.recv().ok();
            Ok(())
        })
        .unwrap();
    started_rx.recv().unwrap();

    assert!(other.is_loading());
    assert!(matches!(other.run(|_| Ok(())), Err(CoreError::Busy)));

    release_tx.send(()).unwrap();
    worker.join().unwrap().unwrap();
}
