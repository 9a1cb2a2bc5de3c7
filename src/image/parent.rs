//! Clone parent pointer.
//!
//! A clone records the parent image snapshot it was created from and how
//! many of its leading bytes still alias that parent (the overlap). Only the
//! head carries a mutable pointer; snapshots keep the copy they inherited.

use serde::{Deserialize, Serialize};

use crate::error::{RbdError, Result};
use crate::storage::ObjectContext;

use super::snapshot::read_snapshot;
use super::{features, guard, keys, read_key, read_optional_key, write_key, NOSNAP};

/// Link from a clone to the parent snapshot it was created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentPointer {
    /// Pool holding the parent image
    pub pool: i64,

    /// Parent image id
    pub image_id: String,

    /// Parent snapshot id
    pub snap_id: u64,

    /// Bytes of the clone that still alias the parent
    pub overlap: u64,
}

/// Parent of the live image (`NOSNAP`) or the one a snapshot inherited
pub fn get_parent<C: ObjectContext + ?Sized>(ctx: &C, snap_id: u64) -> Result<ParentPointer> {
    guard::exists(ctx)?;

    tracing::debug!("get_parent snap_id={}", snap_id);

    guard::require_features(ctx, features::LAYERING)?;

    let parent = if snap_id == NOSNAP {
        read_parent(ctx)?
    } else {
        read_snapshot(ctx, snap_id)?.parent
    };

    parent.ok_or_else(|| RbdError::NotFound("parent".to_string()))
}

/// Attach the head to a parent snapshot of `size` bytes
pub fn set_parent<C: ObjectContext + ?Sized>(
    ctx: &mut C,
    pool: i64,
    image_id: &str,
    snap_id: u64,
    size: u64,
) -> Result<()> {
    guard::exists(&*ctx)?;
    guard::require_features(&*ctx, features::LAYERING)?;

    tracing::debug!(
        "set_parent pool={} id={} snapid={} size={}",
        pool,
        image_id,
        snap_id,
        size
    );

    if pool < 0 || image_id.is_empty() || snap_id == NOSNAP || size == 0 {
        return Err(RbdError::InvalidArgument(format!(
            "invalid parent pool={} id={:?} snapid={} size={}",
            pool, image_id, snap_id, size
        )));
    }

    if let Some(existing) = read_parent(&*ctx)? {
        tracing::debug!(
            "set_parent existing parent pool={} id={} snapid={} overlap={}",
            existing.pool,
            existing.image_id,
            existing.snap_id,
            existing.overlap
        );
        return Err(RbdError::AlreadyExists("parent".to_string()));
    }

    let our_size: u64 = read_key(&*ctx, keys::SIZE)?;

    let parent = ParentPointer {
        pool,
        image_id: image_id.to_string(),
        snap_id,
        overlap: our_size.min(size),
    };

    write_key(ctx, keys::PARENT, &parent)
}

/// Detach the head from its parent
pub fn remove_parent<C: ObjectContext + ?Sized>(ctx: &mut C) -> Result<()> {
    guard::exists(&*ctx)?;
    guard::require_features(&*ctx, features::LAYERING)?;

    if read_parent(&*ctx)?.is_none() {
        return Err(RbdError::NotFound("parent".to_string()));
    }

    ctx.remove_key(keys::PARENT).map_err(|e| {
        tracing::error!("error removing parent: {}", e);
        e
    })
}

/// Current head parent pointer, if any
pub(crate) fn read_parent<C: ObjectContext + ?Sized>(ctx: &C) -> Result<Option<ParentPointer>> {
    read_optional_key(ctx, keys::PARENT)
}

/// Shrink the head's overlap so it never exceeds `new_size`
pub(crate) fn clamp_overlap<C: ObjectContext + ?Sized>(ctx: &mut C, new_size: u64) -> Result<()> {
    let mut parent = match read_parent(&*ctx)? {
        Some(parent) => parent,
        None => return Ok(()),
    };

    if parent.overlap > new_size {
        tracing::debug!("clamping parent overlap {} -> {}", parent.overlap, new_size);
        parent.overlap = new_size;
        write_key(ctx, keys::PARENT, &parent)?;
    }

    Ok(())
}
