//! Legacy Module
//!
//! Snapshot operations on old-format images, whose metadata is a single
//! packed blob rather than separate keys.
//!
//! ## Responsibilities
//! - Byte layout of the header, entries and name table ([`header`])
//! - Reading a self-consistent blob while it may be growing ([`reader`])
//! - List, add and remove snapshots, rewriting the whole blob on change
//!
//! Snapshots are kept newest first: a new entry and its name are placed in
//! front of the existing ones.
//!
//! Names are raw bytes on disk. Lookups compare bytes, rewrites keep every
//! stored name verbatim, and [`list`] reports non-UTF-8 names lossily.

pub mod header;
pub mod reader;

use crate::error::{RbdError, Result};
use crate::storage::ObjectContext;

pub use header::{LegacyHeader, LegacyImage, LegacySnap};
pub use reader::read_stable;

/// One snapshot as reported by [`list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySnapInfo {
    pub id: u64,
    pub image_size: u64,
    pub name: String,
}

/// Result of [`list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySnapList {
    pub snap_seq: u64,
    pub snaps: Vec<LegacySnapInfo>,
}

/// Every snapshot in on-disk order (newest first)
pub fn list<C: ObjectContext + ?Sized>(ctx: &C, max_reads: usize) -> Result<LegacySnapList> {
    tracing::debug!("snap_list");

    let image = read_stable(ctx, max_reads)?;

    let snaps = image
        .snaps
        .iter()
        .zip(image.names)
        .map(|(snap, name)| LegacySnapInfo {
            id: snap.id,
            image_size: snap.image_size,
            name: String::from_utf8_lossy(&name).into_owned(),
        })
        .collect();

    Ok(LegacySnapList {
        snap_seq: image.header.snap_seq,
        snaps,
    })
}

/// Add snapshot `name` with `id`, capturing the current image size
pub fn add<C: ObjectContext + ?Sized>(
    ctx: &mut C,
    name: &str,
    id: u64,
    max_reads: usize,
) -> Result<()> {
    tracing::debug!("snap_add name={} id={}", name, id);

    if name.contains('\0') {
        return Err(RbdError::InvalidArgument(format!(
            "snapshot name {:?} contains NUL",
            name
        )));
    }

    let mut image = read_stable(&*ctx, max_reads)?;

    if image.find(name).is_some() {
        return Err(RbdError::AlreadyExists(format!("snapshot {}", name)));
    }

    image.snaps.insert(
        0,
        LegacySnap {
            id,
            image_size: image.header.image_size,
        },
    );
    image.names.insert(0, name.as_bytes().to_vec());
    image.header.snap_seq = id;

    ctx.write_full(&image.encode())
}

/// Remove snapshot `name`
pub fn remove<C: ObjectContext + ?Sized>(ctx: &mut C, name: &str, max_reads: usize) -> Result<()> {
    tracing::debug!("snap_remove name={}", name);

    let mut image = read_stable(&*ctx, max_reads)?;

    let index = image.find(name).ok_or_else(|| {
        tracing::error!("couldn't find snap {}", name);
        RbdError::NotFound(format!("snapshot {}", name))
    })?;

    image.snaps.remove(index);
    image.names.remove(index);

    ctx.write_full(&image.encode())
}
