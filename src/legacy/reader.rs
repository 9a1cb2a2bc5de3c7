//! Stable read of a legacy image blob.
//!
//! The blob can grow between sizing a read and performing it, so the read is
//! repeated until the counts in the header match the counts used to size
//! that same read.

use crate::error::{RbdError, Result};
use crate::storage::ObjectContext;

use super::header::{blob_len, LegacyHeader, LegacyImage};

/// Read and decode the legacy image, retrying at most `max_reads` times
pub fn read_stable<C: ObjectContext + ?Sized>(ctx: &C, max_reads: usize) -> Result<LegacyImage> {
    let mut snap_count = 0u32;
    let mut names_len = 0u64;

    for attempt in 1..=max_reads {
        let blob = ctx.read(0, blob_len(snap_count, names_len))?;
        let header = LegacyHeader::decode(&blob)?;

        if header.snap_count == snap_count && header.snap_names_len == names_len {
            tracing::trace!("legacy header stable after {} read(s)", attempt);
            return LegacyImage::decode(header, &blob);
        }

        tracing::trace!(
            "legacy header changed: snap_count {} -> {}, snap_names_len {} -> {}",
            snap_count,
            header.snap_count,
            names_len,
            header.snap_names_len
        );
        snap_count = header.snap_count;
        names_len = header.snap_names_len;
    }

    tracing::error!("legacy header did not stabilize after {} reads", max_reads);
    Err(RbdError::Corrupt(format!(
        "legacy header did not stabilize after {} reads",
        max_reads
    )))
}
