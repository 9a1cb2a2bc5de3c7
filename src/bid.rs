//! Block-ID allocator
//!
//! The allocator object holds nothing but an 8-byte little-endian `max_id`.

use crate::error::{RbdError, Result};
use crate::storage::ObjectContext;

/// Size of the counter record
pub const BID_RECORD_SIZE: usize = 8;

/// Hand out the next block id.
///
/// A missing or empty object starts the counter at 0; otherwise the stored
/// value is incremented. The new value is written back and returned.
pub fn assign_bid<C: ObjectContext + ?Sized>(ctx: &mut C) -> Result<u64> {
    let current = match ctx.read(0, BID_RECORD_SIZE as u64) {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(e),
    };

    let max_id = match current.len() {
        0 => 0,
        BID_RECORD_SIZE => {
            let mut raw = [0u8; BID_RECORD_SIZE];
            raw.copy_from_slice(&current);
            u64::from_le_bytes(raw).checked_add(1).ok_or_else(|| {
                RbdError::Corrupt("block id counter exhausted".to_string())
            })?
        }
        n => {
            tracing::error!(
                "bad rbd_info object, read {} bytes, expected {}",
                n,
                BID_RECORD_SIZE
            );
            return Err(RbdError::Corrupt(format!(
                "block id record is {} bytes, expected {}",
                n, BID_RECORD_SIZE
            )));
        }
    };

    tracing::debug!("assign_bid max_id={}", max_id);

    ctx.write_full(&max_id.to_le_bytes())?;

    Ok(max_id)
}
