//! Parent Pointer Tests
//!
//! These tests verify:
//! - Layering feature requirement
//! - Argument validation and overlap computation
//! - Overlap clamping on shrink
//! - Parent inheritance by snapshots

use rbdmeta::image::parent::ParentPointer;
use rbdmeta::{features, Config, Engine, RbdError, NOSNAP};

const OID: &str = "rbd_header.clone";

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_layered_engine(size: u64) -> Engine {
    let engine = Engine::in_memory(Config::default());
    engine
        .create(OID, size, 22, features::LAYERING, "rbd_data.clone")
        .unwrap();
    engine
}

fn parent_at(engine: &Engine, snap_id: u64) -> ParentPointer {
    engine.get_parent(OID, snap_id).unwrap()
}

// =============================================================================
// Feature Guard Tests
// =============================================================================

#[test]
fn test_parent_ops_require_layering() {
    let engine = Engine::in_memory(Config::default());
    engine.create(OID, 1024, 22, 0, "rbd_data.flat").unwrap();

    let need = features::LAYERING;
    assert!(matches!(
        engine.get_parent(OID, NOSNAP),
        Err(RbdError::MissingFeatures { need: n, have: Some(0) }) if n == need
    ));
    assert!(matches!(
        engine.set_parent(OID, 1, "parent", 4, 1024),
        Err(RbdError::MissingFeatures { .. })
    ));
    assert!(matches!(
        engine.remove_parent(OID),
        Err(RbdError::MissingFeatures { .. })
    ));
}

#[test]
fn test_parent_ops_on_missing_object() {
    let engine = Engine::in_memory(Config::default());

    assert!(matches!(
        engine.get_parent("missing", NOSNAP),
        Err(RbdError::NotFound(_))
    ));
    assert!(matches!(
        engine.set_parent("missing", 1, "parent", 4, 1024),
        Err(RbdError::NotFound(_))
    ));
}

// =============================================================================
// set_parent Tests
// =============================================================================

#[test]
fn test_get_parent_when_none_set() {
    let engine = setup_layered_engine(1024);

    assert!(matches!(
        engine.get_parent(OID, NOSNAP),
        Err(RbdError::NotFound(_))
    ));
}

#[test]
fn test_set_parent_overlap_is_min_of_sizes() {
    let engine = setup_layered_engine(1000);

    engine.set_parent(OID, 3, "parent_id", 8, 4000).unwrap();

    assert_eq!(
        parent_at(&engine, NOSNAP),
        ParentPointer {
            pool: 3,
            image_id: "parent_id".to_string(),
            snap_id: 8,
            overlap: 1000,
        }
    );

    let engine = setup_layered_engine(5000);
    engine.set_parent(OID, 3, "parent_id", 8, 4000).unwrap();
    assert_eq!(parent_at(&engine, NOSNAP).overlap, 4000);
}

#[test]
fn test_set_parent_invalid_arguments() {
    let engine = setup_layered_engine(1024);

    let cases = [
        (-1i64, "p", 1u64, 1024u64),
        (0, "", 1, 1024),
        (0, "p", NOSNAP, 1024),
        (0, "p", 1, 0),
    ];

    for (pool, image_id, snap_id, size) in cases {
        let result = engine.set_parent(OID, pool, image_id, snap_id, size);
        assert!(
            matches!(result, Err(RbdError::InvalidArgument(_))),
            "pool={} id={:?} snap={} size={}",
            pool,
            image_id,
            snap_id,
            size
        );
    }

    engine.set_parent(OID, 0, "p", 1, 1024).unwrap();
}

#[test]
fn test_set_parent_twice() {
    let engine = setup_layered_engine(1024);

    engine.set_parent(OID, 1, "first", 1, 1024).unwrap();
    let result = engine.set_parent(OID, 2, "second", 2, 1024);

    assert!(matches!(result, Err(RbdError::AlreadyExists(_))));
    assert_eq!(parent_at(&engine, NOSNAP).image_id, "first");
}

// =============================================================================
// remove_parent Tests
// =============================================================================

#[test]
fn test_remove_parent() {
    let engine = setup_layered_engine(1024);

    engine.set_parent(OID, 1, "p", 1, 1024).unwrap();
    engine.remove_parent(OID).unwrap();

    assert!(matches!(
        engine.get_parent(OID, NOSNAP),
        Err(RbdError::NotFound(_))
    ));
    assert!(matches!(
        engine.remove_parent(OID),
        Err(RbdError::NotFound(_))
    ));

    // A new parent can be attached once the old one is gone
    engine.set_parent(OID, 2, "q", 2, 512).unwrap();
    assert_eq!(parent_at(&engine, NOSNAP).overlap, 512);
}

// =============================================================================
// Overlap Clamping Tests
// =============================================================================

#[test]
fn test_shrink_below_overlap_clamps() {
    let engine = setup_layered_engine(1000);
    engine.set_parent(OID, 1, "p", 1, 1000).unwrap();

    engine.set_size(OID, 600).unwrap();

    assert_eq!(parent_at(&engine, NOSNAP).overlap, 600);
}

#[test]
fn test_shrink_above_overlap_keeps_overlap() {
    let engine = setup_layered_engine(1000);
    engine.set_parent(OID, 1, "p", 1, 500).unwrap();

    engine.set_size(OID, 800).unwrap();

    assert_eq!(parent_at(&engine, NOSNAP).overlap, 500);
}

#[test]
fn test_grow_keeps_overlap() {
    let engine = setup_layered_engine(1000);
    engine.set_parent(OID, 1, "p", 1, 1000).unwrap();

    engine.set_size(OID, 600).unwrap();
    engine.set_size(OID, 2000).unwrap();

    assert_eq!(parent_at(&engine, NOSNAP).overlap, 600);
}

// =============================================================================
// Snapshot Inheritance Tests
// =============================================================================

#[test]
fn test_snapshot_inherits_parent() {
    let engine = setup_layered_engine(1000);
    engine.set_parent(OID, 4, "golden", 2, 1000).unwrap();

    engine.snapshot_add(OID, "s1", 1).unwrap();
    engine.set_size(OID, 100).unwrap();
    engine.remove_parent(OID).unwrap();

    let inherited = parent_at(&engine, 1);
    assert_eq!(inherited.image_id, "golden");
    assert_eq!(inherited.overlap, 1000);

    assert!(matches!(
        engine.get_parent(OID, NOSNAP),
        Err(RbdError::NotFound(_))
    ));
}

#[test]
fn test_snapshot_without_parent() {
    let engine = setup_layered_engine(1000);

    engine.snapshot_add(OID, "s1", 1).unwrap();

    assert!(matches!(
        engine.get_parent(OID, 1),
        Err(RbdError::NotFound(_))
    ));
    assert!(matches!(
        engine.get_parent(OID, 2),
        Err(RbdError::NotFound(_))
    ));
}
