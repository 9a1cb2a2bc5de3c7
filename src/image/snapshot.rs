//! Snapshot Table
//!
//! Snapshot records live under `snapshot_<id>` keys, where the id is written
//! as 16 lowercase hex digits so that key order equals numeric order.
//!
//! ## Sequencing
//! `snap_seq` only ever moves forward. A new snapshot must carry an id no
//! lower than it; the record and the bumped `snap_seq` are written in one
//! batch.
//!
//! ```text
//! snap_seq = 5
//! snapshot_0000000000000002 ──► {name: "a", image_size, features, parent}
//! snapshot_0000000000000005 ──► {name: "b", ...}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RbdError, Result};
use crate::storage::ObjectContext;

use super::parent::{read_parent, ParentPointer};
use super::{encode_value, guard, keys, read_key, MAXSNAP, NOSNAP};

/// Captured state of the image at the moment a snapshot was taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: u64,
    pub name: String,
    pub image_size: u64,
    pub features: u64,
    pub parent: Option<ParentPointer>,
}

/// Sequence number plus live snapshot ids, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapContext {
    pub seq: u64,
    pub snaps: Vec<u64>,
}

// =============================================================================
// Key Helpers
// =============================================================================

/// Attribute key for snapshot `id`
pub fn snap_key(id: u64) -> String {
    format!("{}{:016x}", keys::SNAPSHOT_PREFIX, id)
}

/// Parse the id back out of a snapshot key
pub fn snap_id_from_key(key: &str) -> Result<u64> {
    let hex = key
        .strip_prefix(keys::SNAPSHOT_PREFIX)
        .ok_or_else(|| RbdError::Corrupt(format!("not a snapshot key: {}", key)))?;

    u64::from_str_radix(hex, 16)
        .map_err(|e| RbdError::Corrupt(format!("bad snapshot key {}: {}", key, e)))
}

/// Decode the record stored for snapshot `id`
pub(crate) fn read_snapshot<C: ObjectContext + ?Sized>(ctx: &C, id: u64) -> Result<SnapshotRecord> {
    read_key(ctx, &snap_key(id))
}

/// Walk every snapshot record in id order, `page_size` keys at a time
pub(crate) fn scan_snapshots<C, F>(ctx: &C, page_size: usize, mut visit: F) -> Result<()>
where
    C: ObjectContext + ?Sized,
    F: FnMut(SnapshotRecord) -> Result<()>,
{
    let mut last_read = keys::SNAPSHOT_PREFIX.to_string();

    loop {
        let page = ctx.get_vals(&last_read, keys::SNAPSHOT_PREFIX, page_size)?;

        for (key, bytes) in &page.entries {
            let record: SnapshotRecord = bincode::deserialize(bytes).map_err(|e| {
                tracing::error!("error decoding snapshot record {}: {}", key, e);
                RbdError::Corrupt(format!("decoding {}: {}", key, e))
            })?;
            visit(record)?;
        }

        match page.entries.last() {
            Some((key, _)) if page.more => last_read = key.clone(),
            _ => return Ok(()),
        }
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Every snapshot record, ascending by id
pub fn list_snapshots<C: ObjectContext + ?Sized>(
    ctx: &C,
    page_size: usize,
) -> Result<Vec<SnapshotRecord>> {
    guard::require_features(ctx, 0)?;

    let mut records = Vec::new();
    scan_snapshots(ctx, page_size, |record| {
        records.push(record);
        Ok(())
    })?;
    Ok(records)
}

/// Record a new snapshot of the head and advance `snap_seq` to `id`
pub fn snapshot_add<C: ObjectContext + ?Sized>(
    ctx: &mut C,
    name: &str,
    id: u64,
    page_size: usize,
) -> Result<()> {
    guard::require_features(&*ctx, 0)?;

    tracing::debug!("snapshot_add name={} id={}", name, id);

    if id > MAXSNAP {
        return Err(RbdError::InvalidArgument(format!(
            "snapshot id {} is reserved",
            id
        )));
    }

    let snap_seq: u64 = read_key(&*ctx, keys::SNAP_SEQ).map_err(|e| {
        tracing::error!("could not read the image's snap_seq: {}", e);
        e
    })?;

    if id < snap_seq {
        tracing::debug!("snapshot id {} is older than snap_seq {}", id, snap_seq);
        return Err(RbdError::Stale { id, snap_seq });
    }

    let image_size: u64 = read_key(&*ctx, keys::SIZE)?;
    let features: u64 = read_key(&*ctx, keys::FEATURES)?;

    scan_snapshots(&*ctx, page_size, |existing| {
        if existing.name == name || existing.id == id {
            tracing::debug!(
                "snapshot {} (id {}) collides with {} (id {})",
                name,
                id,
                existing.name,
                existing.id
            );
            return Err(RbdError::AlreadyExists(format!(
                "snapshot {} (id {})",
                name, id
            )));
        }
        Ok(())
    })?;

    let record = SnapshotRecord {
        id,
        name: name.to_string(),
        image_size,
        features,
        parent: read_parent(&*ctx)?,
    };

    let mut vals = BTreeMap::new();
    vals.insert(snap_key(id), encode_value(&record)?);
    vals.insert(keys::SNAP_SEQ.to_string(), encode_value(&id)?);

    ctx.set_vals(vals)
}

/// Delete the record of snapshot `id`
pub fn snapshot_remove<C: ObjectContext + ?Sized>(ctx: &mut C, id: u64) -> Result<()> {
    guard::require_features(&*ctx, 0)?;

    tracing::debug!("snapshot_remove id={}", id);

    let key = snap_key(id);
    ctx.get_val(&key)?;

    ctx.remove_key(&key).map_err(|e| {
        tracing::error!("error removing snapshot {}: {}", id, e);
        e
    })
}

/// Name of snapshot `id`
pub fn get_snapshot_name<C: ObjectContext + ?Sized>(ctx: &C, id: u64) -> Result<String> {
    guard::require_features(ctx, 0)?;

    tracing::debug!("get_snapshot_name snap_id={}", id);

    if id == NOSNAP {
        return Err(RbdError::InvalidArgument(
            "the head has no snapshot name".to_string(),
        ));
    }

    Ok(read_snapshot(ctx, id)?.name)
}

/// `snap_seq` and every live snapshot id in descending order
pub fn get_snapcontext<C: ObjectContext + ?Sized>(ctx: &C, page_size: usize) -> Result<SnapContext> {
    guard::require_features(ctx, 0)?;

    tracing::debug!("get_snapcontext");

    let mut snaps = Vec::new();
    let mut last_read = keys::SNAPSHOT_PREFIX.to_string();

    loop {
        let page = ctx.get_keys(&last_read, keys::SNAPSHOT_PREFIX, page_size)?;

        for key in &page.entries {
            snaps.push(snap_id_from_key(key)?);
        }

        match page.entries.last() {
            Some(key) if page.more => last_read = key.clone(),
            _ => break,
        }
    }

    snaps.reverse();

    let seq = read_key(ctx, keys::SNAP_SEQ).map_err(|e| {
        tracing::error!("could not read the image's snap_seq: {}", e);
        e
    })?;

    Ok(SnapContext { seq, snaps })
}

