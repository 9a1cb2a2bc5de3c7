//! Method and request definitions
//!
//! Every method the engine answers, with its access flags, and the typed
//! request each one takes.

/// Method access flags
pub mod flags {
    /// Method reads the object
    pub const RD: u8 = 0x1;

    /// Method may change the object; without it writes are discarded
    pub const WR: u8 = 0x2;
}

use flags::{RD, WR};

/// A registered method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    // New-format image metadata
    Create,
    GetFeatures,
    GetSize,
    SetSize,
    GetSnapContext,
    GetObjectPrefix,
    GetSnapshotName,
    SnapshotAdd,
    SnapshotRemove,
    GetAllFeatures,

    // Locks
    LockExclusive,
    LockShared,
    UnlockImage,
    BreakLock,
    ListLocks,

    // Clone parent
    GetParent,
    SetParent,
    RemoveParent,

    // Old format
    SnapList,
    SnapAdd,
    SnapRemove,
    AssignBid,
}

impl Method {
    /// Every method, in registration order
    pub const ALL: [Method; 22] = [
        Method::Create,
        Method::GetFeatures,
        Method::GetSize,
        Method::SetSize,
        Method::GetSnapContext,
        Method::GetObjectPrefix,
        Method::GetSnapshotName,
        Method::SnapshotAdd,
        Method::SnapshotRemove,
        Method::GetAllFeatures,
        Method::LockExclusive,
        Method::LockShared,
        Method::UnlockImage,
        Method::BreakLock,
        Method::ListLocks,
        Method::GetParent,
        Method::SetParent,
        Method::RemoveParent,
        Method::SnapList,
        Method::SnapAdd,
        Method::SnapRemove,
        Method::AssignBid,
    ];

    /// Name callers use to invoke the method
    pub fn name(&self) -> &'static str {
        match self {
            Method::Create => "create",
            Method::GetFeatures => "get_features",
            Method::GetSize => "get_size",
            Method::SetSize => "set_size",
            Method::GetSnapContext => "get_snapcontext",
            Method::GetObjectPrefix => "get_object_prefix",
            Method::GetSnapshotName => "get_snapshot_name",
            Method::SnapshotAdd => "snapshot_add",
            Method::SnapshotRemove => "snapshot_remove",
            Method::GetAllFeatures => "get_all_features",
            Method::LockExclusive => "lock_exclusive",
            Method::LockShared => "lock_shared",
            Method::UnlockImage => "unlock_image",
            Method::BreakLock => "break_lock",
            Method::ListLocks => "list_locks",
            Method::GetParent => "get_parent",
            Method::SetParent => "set_parent",
            Method::RemoveParent => "remove_parent",
            Method::SnapList => "snap_list",
            Method::SnapAdd => "snap_add",
            Method::SnapRemove => "snap_remove",
            Method::AssignBid => "assign_bid",
        }
    }

    /// Access flags (`RD`, `RD | WR`)
    pub fn flags(&self) -> u8 {
        match self {
            Method::GetFeatures
            | Method::GetSize
            | Method::GetSnapContext
            | Method::GetObjectPrefix
            | Method::GetSnapshotName
            | Method::GetAllFeatures
            | Method::ListLocks
            | Method::GetParent
            | Method::SnapList => RD,
            _ => RD | WR,
        }
    }

    /// Whether the method's writes are committed
    pub fn is_writable(&self) -> bool {
        self.flags() & WR != 0
    }
}

/// A decoded method invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create {
        size: u64,
        order: u8,
        features: u64,
        object_prefix: String,
    },
    GetFeatures {
        snap_id: u64,
    },
    GetSize {
        snap_id: u64,
    },
    SetSize {
        size: u64,
    },
    GetSnapContext,
    GetObjectPrefix,
    GetSnapshotName {
        snap_id: u64,
    },
    SnapshotAdd {
        name: String,
        snap_id: u64,
    },
    SnapshotRemove {
        snap_id: u64,
    },
    GetAllFeatures,

    LockExclusive {
        cookie: String,
    },
    LockShared {
        cookie: String,
    },
    UnlockImage {
        cookie: String,
    },
    /// Administrative release of someone else's lock
    BreakLock {
        locker: String,
        cookie: String,
    },
    ListLocks,

    GetParent {
        snap_id: u64,
    },
    SetParent {
        pool: i64,
        image_id: String,
        snap_id: u64,
        size: u64,
    },
    RemoveParent,

    SnapList,
    SnapAdd {
        name: String,
        snap_id: u64,
    },
    SnapRemove {
        name: String,
    },
    AssignBid,
}

impl Request {
    /// The method this request invokes
    pub fn method(&self) -> Method {
        match self {
            Request::Create { .. } => Method::Create,
            Request::GetFeatures { .. } => Method::GetFeatures,
            Request::GetSize { .. } => Method::GetSize,
            Request::SetSize { .. } => Method::SetSize,
            Request::GetSnapContext => Method::GetSnapContext,
            Request::GetObjectPrefix => Method::GetObjectPrefix,
            Request::GetSnapshotName { .. } => Method::GetSnapshotName,
            Request::SnapshotAdd { .. } => Method::SnapshotAdd,
            Request::SnapshotRemove { .. } => Method::SnapshotRemove,
            Request::GetAllFeatures => Method::GetAllFeatures,
            Request::LockExclusive { .. } => Method::LockExclusive,
            Request::LockShared { .. } => Method::LockShared,
            Request::UnlockImage { .. } => Method::UnlockImage,
            Request::BreakLock { .. } => Method::BreakLock,
            Request::ListLocks => Method::ListLocks,
            Request::GetParent { .. } => Method::GetParent,
            Request::SetParent { .. } => Method::SetParent,
            Request::RemoveParent => Method::RemoveParent,
            Request::SnapList => Method::SnapList,
            Request::SnapAdd { .. } => Method::SnapAdd,
            Request::SnapRemove { .. } => Method::SnapRemove,
            Request::AssignBid => Method::AssignBid,
        }
    }
}
