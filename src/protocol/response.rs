//! Response definitions
//!
//! Typed results of a method call. Errors travel separately as a signed code.

use crate::image::attrs::{ImageFeatures, ImageSize};
use crate::image::lock::LockList;
use crate::image::parent::ParentPointer;
use crate::image::snapshot::SnapContext;
use crate::legacy::LegacySnapList;

/// Output of a successful method call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Method has no output
    Empty,

    Features(ImageFeatures),
    Size(ImageSize),
    SnapContext(SnapContext),
    ObjectPrefix(String),
    SnapshotName(String),
    AllFeatures(u64),
    Locks(LockList),
    Parent(ParentPointer),
    LegacySnaps(LegacySnapList),

    /// Newly assigned block id
    Bid(u64),
}
