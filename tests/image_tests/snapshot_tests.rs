//! Snapshot Table Tests
//!
//! These tests verify:
//! - Snapshot key encoding
//! - snap_seq sequencing and stale ids
//! - Name/id collisions across paginated scans
//! - Captured size and features
//! - Snapshot context ordering

use rbdmeta::image::snapshot::{snap_id_from_key, snap_key};
use rbdmeta::storage::ObjectState;
use rbdmeta::{features, Config, Engine, RbdError, MAXSNAP, NOSNAP};

const OID: &str = "rbd_header.1234";

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine() -> Engine {
    let engine = Engine::in_memory(Config::default());
    engine.create(OID, 1024, 22, 0, "rbd_data.1234").unwrap();
    engine
}

fn setup_engine_with_page_size(page_size: usize) -> Engine {
    let config = Config::builder().max_keys_read(page_size).build();
    let engine = Engine::in_memory(config);
    engine.create(OID, 1024, 22, 0, "rbd_data.1234").unwrap();
    engine
}

// =============================================================================
// Key Encoding Tests
// =============================================================================

#[test]
fn test_snap_key_order_matches_id_order() {
    let ids = [0u64, 1, 9, 10, 255, 256, 1 << 40, MAXSNAP];
    let keys: Vec<String> = ids.iter().map(|id| snap_key(*id)).collect();

    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(snap_key(10), "snapshot_000000000000000a");
}

#[test]
fn test_snap_id_from_key() {
    assert_eq!(snap_id_from_key(&snap_key(0xabc)).unwrap(), 0xabc);
    assert!(matches!(
        snap_id_from_key("snapshot_zz"),
        Err(RbdError::Corrupt(_))
    ));
    assert!(matches!(snap_id_from_key("size"), Err(RbdError::Corrupt(_))));
}

// =============================================================================
// Sequencing Tests
// =============================================================================

#[test]
fn test_snapshot_add_bumps_snap_seq() {
    let engine = setup_engine();

    engine.snapshot_add(OID, "s1", 5).unwrap();

    let snapc = engine.get_snapcontext(OID).unwrap();
    assert_eq!(snapc.seq, 5);
    assert_eq!(snapc.snaps, vec![5]);
}

#[test]
fn test_snapshot_add_stale_id() {
    let engine = setup_engine();

    engine.snapshot_add(OID, "s1", 5).unwrap();
    let result = engine.snapshot_add(OID, "s2", 3);

    assert!(matches!(result, Err(RbdError::Stale { id: 3, snap_seq: 5 })));
    assert_eq!(result.unwrap_err().code(), -116);
    assert_eq!(engine.get_snapcontext(OID).unwrap().snaps, vec![5]);
}

#[test]
fn test_stale_reported_before_name_collision() {
    let engine = setup_engine();

    engine.snapshot_add(OID, "s1", 5).unwrap();
    let result = engine.snapshot_add(OID, "s1", 4);

    assert!(matches!(result, Err(RbdError::Stale { .. })));
}

#[test]
fn test_snapshot_add_reuses_snap_seq_after_remove() {
    let engine = setup_engine();

    engine.snapshot_add(OID, "s1", 5).unwrap();
    engine.snapshot_remove(OID, 5).unwrap();
    engine.snapshot_add(OID, "s2", 5).unwrap();

    assert_eq!(engine.get_snapshot_name(OID, 5).unwrap(), "s2");
    assert_eq!(engine.get_snapcontext(OID).unwrap().seq, 5);
}

#[test]
fn test_snapshot_add_reserved_id() {
    let engine = setup_engine();

    assert!(matches!(
        engine.snapshot_add(OID, "s1", MAXSNAP + 1),
        Err(RbdError::InvalidArgument(_))
    ));
    assert!(matches!(
        engine.snapshot_add(OID, "s1", NOSNAP),
        Err(RbdError::InvalidArgument(_))
    ));

    engine.snapshot_add(OID, "max", MAXSNAP).unwrap();
}

// =============================================================================
// Collision Tests
// =============================================================================

#[test]
fn test_snapshot_add_duplicate_name() {
    let engine = setup_engine();

    engine.snapshot_add(OID, "s1", 1).unwrap();
    let result = engine.snapshot_add(OID, "s1", 2);

    assert!(matches!(result, Err(RbdError::AlreadyExists(_))));
    assert_eq!(engine.get_snapcontext(OID).unwrap().seq, 1);
}

#[test]
fn test_snapshot_add_duplicate_id() {
    let engine = setup_engine();

    engine.snapshot_add(OID, "s1", 7).unwrap();
    let result = engine.snapshot_add(OID, "s2", 7);

    assert!(matches!(result, Err(RbdError::AlreadyExists(_))));
    assert_eq!(engine.get_snapshot_name(OID, 7).unwrap(), "s1");
}

#[test]
fn test_collision_found_past_first_page() {
    let engine = setup_engine_with_page_size(2);

    for id in 1..=7 {
        engine.snapshot_add(OID, &format!("snap{}", id), id).unwrap();
    }

    // snap6 lives on the third page of two keys each
    let result = engine.snapshot_add(OID, "snap6", 8);
    assert!(matches!(result, Err(RbdError::AlreadyExists(_))));

    engine.snapshot_add(OID, "snap8", 8).unwrap();
}

// =============================================================================
// Snapshot Context Tests
// =============================================================================

#[test]
fn test_snapcontext_descending_across_pages() {
    let engine = setup_engine_with_page_size(3);

    let ids = [2u64, 3, 10, 16, 17, 255, 256, 4096];
    for id in ids {
        engine.snapshot_add(OID, &format!("s{}", id), id).unwrap();
    }

    let snapc = engine.get_snapcontext(OID).unwrap();
    let mut expected = ids.to_vec();
    expected.reverse();

    assert_eq!(snapc.snaps, expected);
    assert_eq!(snapc.seq, 4096);
}

#[test]
fn test_snapcontext_empty_image() {
    let engine = setup_engine();

    let snapc = engine.get_snapcontext(OID).unwrap();
    assert_eq!(snapc.seq, 0);
    assert!(snapc.snaps.is_empty());
}

#[test]
fn test_snapcontext_keeps_seq_after_remove() {
    let engine = setup_engine();

    engine.snapshot_add(OID, "a", 1).unwrap();
    engine.snapshot_add(OID, "b", 2).unwrap();
    engine.snapshot_remove(OID, 2).unwrap();

    let snapc = engine.get_snapcontext(OID).unwrap();
    assert_eq!(snapc.seq, 2);
    assert_eq!(snapc.snaps, vec![1]);
}

// =============================================================================
// Captured State Tests
// =============================================================================

#[test]
fn test_snapshot_captures_size() {
    let engine = setup_engine();

    engine.snapshot_add(OID, "before", 1).unwrap();
    engine.set_size(OID, 4096).unwrap();

    assert_eq!(engine.get_size(OID, 1).unwrap().size, 1024);
    assert_eq!(engine.get_size(OID, NOSNAP).unwrap().size, 4096);
    assert_eq!(engine.get_size(OID, 1).unwrap().order, 22);
}

#[test]
fn test_snapshot_captures_features() {
    let engine = Engine::in_memory(Config::default());
    engine
        .create(OID, 1024, 22, features::LAYERING, "rbd_data.1234")
        .unwrap();

    engine.snapshot_add(OID, "s1", 1).unwrap();

    let captured = engine.get_features(OID, 1).unwrap();
    assert_eq!(captured.features, features::LAYERING);
    assert_eq!(captured.incompatible, features::LAYERING);
}

#[test]
fn test_list_snapshots() {
    let engine = setup_engine();

    engine.snapshot_add(OID, "a", 1).unwrap();
    engine.set_size(OID, 2048).unwrap();
    engine.snapshot_add(OID, "b", 2).unwrap();

    let records = engine.list_snapshots(OID).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!((records[0].id, records[0].name.as_str()), (1, "a"));
    assert_eq!(records[0].image_size, 1024);
    assert_eq!((records[1].id, records[1].name.as_str()), (2, "b"));
    assert_eq!(records[1].image_size, 2048);
    assert!(records[1].parent.is_none());
}

// =============================================================================
// Lookup and Removal Tests
// =============================================================================

#[test]
fn test_get_snapshot_name() {
    let engine = setup_engine();

    engine.snapshot_add(OID, "daily", 3).unwrap();

    assert_eq!(engine.get_snapshot_name(OID, 3).unwrap(), "daily");
    assert!(matches!(
        engine.get_snapshot_name(OID, 4),
        Err(RbdError::NotFound(_))
    ));
    assert!(matches!(
        engine.get_snapshot_name(OID, NOSNAP),
        Err(RbdError::InvalidArgument(_))
    ));
}

#[test]
fn test_snapshot_remove_missing() {
    let engine = setup_engine();

    let result = engine.snapshot_remove(OID, 9);
    assert!(matches!(result, Err(RbdError::NotFound(_))));
    assert_eq!(result.unwrap_err().code(), -2);
}

#[test]
fn test_get_size_of_missing_snapshot() {
    let engine = setup_engine();

    assert!(matches!(
        engine.get_size(OID, 42),
        Err(RbdError::NotFound(_))
    ));
}

// =============================================================================
// Guard Tests
// =============================================================================

#[test]
fn test_snapshot_ops_on_missing_object() {
    let engine = Engine::in_memory(Config::default());

    assert!(matches!(
        engine.snapshot_add("nope", "s1", 1),
        Err(RbdError::NotFound(_))
    ));
    assert!(matches!(
        engine.get_snapcontext("nope"),
        Err(RbdError::NotFound(_))
    ));
    assert_eq!(engine.store().object_count(), 0);
}

#[test]
fn test_snapshot_ops_on_featureless_object() {
    let engine = Engine::in_memory(Config::default());
    engine.store().insert_object(
        OID,
        ObjectState {
            data: b"old header".to_vec(),
            ..Default::default()
        },
    );

    let result = engine.snapshot_add(OID, "s1", 1);
    assert!(matches!(
        result,
        Err(RbdError::MissingFeatures { need: 0, have: None })
    ));
    assert_eq!(result.unwrap_err().code(), -8);
}
