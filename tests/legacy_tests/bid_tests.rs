//! Block-ID Allocator Tests

use rbdmeta::storage::ObjectState;
use rbdmeta::{Config, Engine, RbdError};

const INFO_OID: &str = "rbd_info";

// =============================================================================
// Helper Functions
// =============================================================================

fn engine_with_info(data: Vec<u8>) -> Engine {
    let engine = Engine::in_memory(Config::default());
    engine.store().insert_object(
        INFO_OID,
        ObjectState {
            data,
            ..Default::default()
        },
    );
    engine
}

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_first_bid_on_missing_object() {
    let engine = Engine::in_memory(Config::default());

    assert_eq!(engine.assign_bid(INFO_OID).unwrap(), 0);

    let stored = engine.store().object(INFO_OID).unwrap();
    assert_eq!(stored.data, 0u64.to_le_bytes().to_vec());
}

#[test]
fn test_first_bid_on_empty_object() {
    let engine = engine_with_info(Vec::new());

    assert_eq!(engine.assign_bid(INFO_OID).unwrap(), 0);
}

#[test]
fn test_bids_increase() {
    let engine = Engine::in_memory(Config::default());

    let ids: Vec<u64> = (0..5).map(|_| engine.assign_bid(INFO_OID).unwrap()).collect();

    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(
        engine.store().object(INFO_OID).unwrap().data,
        4u64.to_le_bytes().to_vec()
    );
}

#[test]
fn test_bid_continues_from_stored_value() {
    let engine = engine_with_info(41u64.to_le_bytes().to_vec());

    assert_eq!(engine.assign_bid(INFO_OID).unwrap(), 42);
}

#[test]
fn test_short_record_is_corrupt() {
    let engine = engine_with_info(vec![1, 2, 3]);

    let result = engine.assign_bid(INFO_OID);
    assert!(matches!(result, Err(RbdError::Corrupt(_))));
    assert_eq!(result.unwrap_err().code(), -5);

    // Nothing was rewritten
    assert_eq!(engine.store().object(INFO_OID).unwrap().data, vec![1, 2, 3]);
}

#[test]
fn test_exhausted_counter() {
    let engine = engine_with_info(u64::MAX.to_le_bytes().to_vec());

    assert!(matches!(
        engine.assign_bid(INFO_OID),
        Err(RbdError::Corrupt(_))
    ));
}
