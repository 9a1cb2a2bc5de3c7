//! Image attributes: size, order, features and object prefix.

use std::collections::BTreeMap;

use crate::error::{RbdError, Result};
use crate::storage::ObjectContext;

use super::snapshot::read_snapshot;
use super::{encode_value, features, guard, keys, parent, read_key, write_key, NOSNAP};

/// Size of the image (or of a snapshot) and its data object size exponent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    /// Data objects are `1 << order` bytes
    pub order: u8,

    /// Image size in bytes
    pub size: u64,
}

/// Enabled features, with the subset a client must understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFeatures {
    pub features: u64,
    pub incompatible: u64,
}

/// Initialize a new-format image on the header object.
///
/// Writes `size`, `order`, `features`, `object_prefix` and `snap_seq = 0`
/// in one batch.
pub fn create<C: ObjectContext + ?Sized>(
    ctx: &mut C,
    size: u64,
    order: u8,
    features: u64,
    object_prefix: &str,
) -> Result<()> {
    tracing::debug!(
        "create object_prefix={} size={} order={} features={:#x}",
        object_prefix,
        size,
        order,
        features
    );

    let unknown = features & !features::ALL;
    if unknown != 0 {
        return Err(RbdError::UnsupportedFeatures(unknown));
    }

    if object_prefix.is_empty() {
        return Err(RbdError::InvalidArgument(
            "object prefix must not be empty".to_string(),
        ));
    }

    match ctx.get_val(keys::OBJECT_PREFIX) {
        Ok(_) => {
            return Err(RbdError::AlreadyExists(
                "image already has an object prefix".to_string(),
            ))
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    let mut vals = BTreeMap::new();
    vals.insert(keys::SIZE.to_string(), encode_value(&size)?);
    vals.insert(keys::ORDER.to_string(), encode_value(&order)?);
    vals.insert(keys::FEATURES.to_string(), encode_value(&features)?);
    vals.insert(
        keys::OBJECT_PREFIX.to_string(),
        encode_value(&object_prefix.to_string())?,
    );
    vals.insert(keys::SNAP_SEQ.to_string(), encode_value(&0u64)?);

    ctx.set_vals(vals)
}

/// Features of the live image (`NOSNAP`) or as captured by a snapshot
pub fn get_features<C: ObjectContext + ?Sized>(ctx: &C, snap_id: u64) -> Result<ImageFeatures> {
    guard::require_features(ctx, 0)?;

    tracing::debug!("get_features snap_id={}", snap_id);

    let features = if snap_id == NOSNAP {
        read_key(ctx, keys::FEATURES)?
    } else {
        read_snapshot(ctx, snap_id)?.features
    };

    Ok(ImageFeatures {
        features,
        incompatible: features & features::INCOMPATIBLE,
    })
}

/// Order and size of the live image (`NOSNAP`) or of a snapshot
pub fn get_size<C: ObjectContext + ?Sized>(ctx: &C, snap_id: u64) -> Result<ImageSize> {
    guard::require_features(ctx, 0)?;

    tracing::debug!("get_size snap_id={}", snap_id);

    let order: u8 = read_key(ctx, keys::ORDER).map_err(|e| {
        tracing::error!("failed to read the order: {}", e);
        e
    })?;

    let size = if snap_id == NOSNAP {
        read_key(ctx, keys::SIZE)?
    } else {
        read_snapshot(ctx, snap_id)?.image_size
    };

    Ok(ImageSize { order, size })
}

/// Resize the live image, shrinking the parent overlap along with it
pub fn set_size<C: ObjectContext + ?Sized>(ctx: &mut C, size: u64) -> Result<()> {
    guard::require_features(&*ctx, 0)?;

    let orig_size: u64 = read_key(&*ctx, keys::SIZE).map_err(|e| {
        tracing::error!("could not read image size: {}", e);
        e
    })?;

    tracing::debug!("set_size size={} orig_size={}", size, orig_size);

    write_key(ctx, keys::SIZE, &size)?;

    if size < orig_size {
        parent::clamp_overlap(ctx, size)?;
    }

    Ok(())
}

/// Prefix shared by the names of all data objects
pub fn get_object_prefix<C: ObjectContext + ?Sized>(ctx: &C) -> Result<String> {
    guard::require_features(ctx, 0)?;

    tracing::debug!("get_object_prefix");

    read_key(ctx, keys::OBJECT_PREFIX)
}

/// Every feature bit this engine supports
pub fn get_all_features() -> u64 {
    features::ALL
}
