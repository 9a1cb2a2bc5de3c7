//! Existence and feature checks run before new-format operations.

use crate::error::{RbdError, Result};
use crate::storage::ObjectContext;

use super::{keys, read_key};

/// Succeeds iff the header object exists
pub fn exists<C: ObjectContext + ?Sized>(ctx: &C) -> Result<()> {
    ctx.stat().map(|_| ())
}

/// Check that every bit in `need` is enabled on the image.
///
/// A missing `features` key on an existing object means the image predates
/// the feature system, which is reported as missing features rather than
/// `NotFound`.
pub fn require_features<C: ObjectContext + ?Sized>(ctx: &C, need: u64) -> Result<()> {
    let have: u64 = match read_key(ctx, keys::FEATURES) {
        Ok(have) => have,
        Err(e) if e.is_not_found() => {
            exists(ctx)?;
            return Err(RbdError::MissingFeatures { need, have: None });
        }
        Err(e) => return Err(e),
    };

    if have & need != need {
        tracing::debug!("require_features missing {:#x}, have {:#x}", need, have);
        return Err(RbdError::MissingFeatures {
            need,
            have: Some(have),
        });
    }

    Ok(())
}
