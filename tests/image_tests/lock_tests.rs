//! Lock Manager Tests
//!
//! These tests verify:
//! - Exclusive/shared mutual exclusion
//! - Duplicate locker rejection
//! - unlock / break_lock semantics
//! - list_locks reporting

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use rbdmeta::{Config, Engine, Origin, RbdError};

const OID: &str = "rbd_header.locked";

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine() -> Engine {
    let engine = Engine::in_memory(Config::default());
    engine.create(OID, 1 << 20, 22, 0, "rbd_data.locked").unwrap();
    engine
}

fn lockers(pairs: &[(&str, &str)]) -> BTreeSet<(String, String)> {
    pairs
        .iter()
        .map(|(entity, cookie)| (entity.to_string(), cookie.to_string()))
        .collect()
}

// =============================================================================
// Mutual Exclusion Tests
// =============================================================================

#[test]
fn test_exclusive_blocks_shared_until_unlock() {
    let engine = setup_engine();
    let x = Origin::new("client.x");
    let y = Origin::new("client.y");

    engine.lock_exclusive(OID, &x, "cookieA").unwrap();

    let result = engine.lock_shared(OID, &y, "cookieB");
    assert!(matches!(result, Err(RbdError::Busy(_))));
    assert_eq!(result.unwrap_err().code(), -16);

    engine.unlock_image(OID, &x, "cookieA").unwrap();
    engine.lock_shared(OID, &y, "cookieB").unwrap();
}

#[test]
fn test_exclusive_blocks_exclusive() {
    let engine = setup_engine();

    engine
        .lock_exclusive(OID, &Origin::new("client.x"), "a")
        .unwrap();

    assert!(matches!(
        engine.lock_exclusive(OID, &Origin::new("client.y"), "b"),
        Err(RbdError::Busy(_))
    ));
    // The holder itself cannot take a second exclusive lock either
    assert!(matches!(
        engine.lock_exclusive(OID, &Origin::new("client.x"), "c"),
        Err(RbdError::Busy(_))
    ));
}

#[test]
fn test_shared_locks_coexist() {
    let engine = setup_engine();

    engine.lock_shared(OID, &Origin::new("client.a"), "c1").unwrap();
    engine.lock_shared(OID, &Origin::new("client.b"), "c1").unwrap();
    engine.lock_shared(OID, &Origin::new("client.a"), "c2").unwrap();

    let locks = engine.list_locks(OID).unwrap();
    assert!(!locks.exclusive);
    assert_eq!(
        locks.lockers,
        lockers(&[("client.a", "c1"), ("client.a", "c2"), ("client.b", "c1")])
    );
}

#[test]
fn test_shared_blocks_exclusive() {
    let engine = setup_engine();

    engine.lock_shared(OID, &Origin::new("client.a"), "c1").unwrap();

    assert!(matches!(
        engine.lock_exclusive(OID, &Origin::new("client.b"), "c2"),
        Err(RbdError::Busy(_))
    ));
}

#[test]
fn test_duplicate_locker_rejected() {
    let engine = setup_engine();
    let a = Origin::new("client.a");

    engine.lock_shared(OID, &a, "c1").unwrap();
    let result = engine.lock_shared(OID, &a, "c1");

    assert!(matches!(result, Err(RbdError::AlreadyExists(_))));
    assert_eq!(engine.list_locks(OID).unwrap().lockers.len(), 1);
}

#[test]
fn test_exclusive_after_all_shared_released() {
    let engine = setup_engine();
    let a = Origin::new("client.a");
    let b = Origin::new("client.b");

    engine.lock_shared(OID, &a, "c").unwrap();
    engine.lock_shared(OID, &b, "c").unwrap();
    engine.unlock_image(OID, &a, "c").unwrap();
    engine.unlock_image(OID, &b, "c").unwrap();

    engine.lock_exclusive(OID, &a, "x").unwrap();

    let locks = engine.list_locks(OID).unwrap();
    assert!(locks.exclusive);
    assert_eq!(locks.lockers, lockers(&[("client.a", "x")]));
}

// =============================================================================
// Unlock / Break Tests
// =============================================================================

#[test]
fn test_unlock_wrong_identity_or_cookie() {
    let engine = setup_engine();
    let x = Origin::new("client.x");

    engine.lock_exclusive(OID, &x, "cookieA").unwrap();

    assert!(matches!(
        engine.unlock_image(OID, &Origin::new("client.y"), "cookieA"),
        Err(RbdError::NotFound(_))
    ));
    assert!(matches!(
        engine.unlock_image(OID, &x, "cookieB"),
        Err(RbdError::NotFound(_))
    ));
    assert_eq!(engine.list_locks(OID).unwrap().lockers.len(), 1);
}

#[test]
fn test_unlock_never_locked() {
    let engine = setup_engine();

    assert!(matches!(
        engine.unlock_image(OID, &Origin::new("client.x"), "c"),
        Err(RbdError::NotFound(_))
    ));
}

#[test]
fn test_break_lock() {
    let engine = setup_engine();

    engine
        .lock_exclusive(OID, &Origin::new("client.dead"), "stale")
        .unwrap();

    engine.break_lock(OID, "client.dead", "stale").unwrap();

    assert!(engine.list_locks(OID).unwrap().lockers.is_empty());
    engine
        .lock_exclusive(OID, &Origin::new("client.new"), "fresh")
        .unwrap();

    assert!(matches!(
        engine.break_lock(OID, "client.dead", "stale"),
        Err(RbdError::NotFound(_))
    ));
}

// =============================================================================
// list_locks Tests
// =============================================================================

#[test]
fn test_list_locks_never_locked() {
    let engine = setup_engine();

    let locks = engine.list_locks(OID).unwrap();
    assert!(locks.lockers.is_empty());
    assert!(!locks.exclusive);
}

#[test]
fn test_lock_ops_on_missing_object() {
    let engine = Engine::in_memory(Config::default());

    assert!(matches!(
        engine.lock_exclusive("missing", &Origin::new("client.x"), "c"),
        Err(RbdError::NotFound(_))
    ));
    assert!(matches!(
        engine.list_locks("missing"),
        Err(RbdError::NotFound(_))
    ));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_exclusive_single_winner() {
    let engine = Arc::new(setup_engine());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let origin = Origin::new(format!("client.{}", i));
                engine.lock_exclusive(OID, &origin, "race").is_ok()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);

    let locks = engine.list_locks(OID).unwrap();
    assert!(locks.exclusive);
    assert_eq!(locks.lockers.len(), 1);
}
