//! Engine Module
//!
//! Entry point hosts use to invoke metadata methods on backing objects.
//!
//! ## Responsibilities
//! - Own the method table and resolve method names
//! - Decode inputs, run each call as one store transaction, encode outputs
//! - Commit writes only for methods flagged writable
//! - Expose a typed method per operation for in-process callers

use std::collections::HashMap;
use std::path::Path;

use crate::bid;
use crate::config::Config;
use crate::error::{RbdError, Result};
use crate::image::attrs::{self, ImageFeatures, ImageSize};
use crate::image::lock::{self, LockList, LockType, Origin};
use crate::image::parent::{self, ParentPointer};
use crate::image::snapshot::{self, SnapContext, SnapshotRecord};
use crate::legacy::{self, LegacySnapList};
use crate::protocol::{decode_request, encode_response, Method, Request, Response};
use crate::storage::{FileStore, MemStore, ObjectStore, ObjectTxn};

/// Name → method lookup, built once when the engine starts
pub struct MethodTable {
    methods: HashMap<&'static str, Method>,
}

impl MethodTable {
    /// Table holding every method the engine implements
    pub fn new() -> Self {
        let methods = Method::ALL
            .iter()
            .map(|method| (method.name(), *method))
            .collect();
        Self { methods }
    }

    /// Method registered under `name`
    pub fn lookup(&self, name: &str) -> Option<Method> {
        self.methods.get(name).copied()
    }

    /// Number of registered methods
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl Default for MethodTable {
    fn default() -> Self {
        Self::new()
    }
}

/// The metadata engine
///
/// ## Concurrency Model
/// Every call is a single [`ObjectStore::transact`] on one object. The store
/// serializes writable transactions per object, so each call sees a
/// consistent object and its writes land all together or not at all. The
/// engine itself keeps no per-image state between calls.
pub struct Engine<S: ObjectStore = MemStore> {
    /// Engine configuration
    config: Config,

    /// Backing objects
    store: S,

    /// Registered methods
    methods: MethodTable,
}

impl Engine<MemStore> {
    /// Engine over a fresh in-memory store
    pub fn in_memory(config: Config) -> Self {
        Self::with_store(config, MemStore::new())
    }
}

impl Engine<FileStore> {
    /// Open or create a file-backed engine rooted at `config.data_dir`
    pub fn open(config: Config) -> Result<Self> {
        let store = FileStore::open(&config.data_dir)?;
        Ok(Self::with_store(config, store))
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }
}

impl<S: ObjectStore> Engine<S> {
    /// Engine over an existing store. Out-of-range limits in `config` are
    /// raised to their minimums.
    pub fn with_store(config: Config, store: S) -> Self {
        Self {
            config: config.clamped(),
            store,
            methods: MethodTable::new(),
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Invoke `method` by name with an encoded input, returning encoded output
    pub fn execute(&self, oid: &str, origin: &Origin, method: &str, input: &[u8]) -> Result<Vec<u8>> {
        let method = self.methods.lookup(method).ok_or_else(|| {
            tracing::debug!("unknown method {} on {}", method, oid);
            RbdError::UnknownMethod(method.to_string())
        })?;

        let request = decode_request(method, input).map_err(|e| {
            tracing::debug!("malformed input for {}: {}", method.name(), e);
            e
        })?;

        let response = self.call(oid, origin, request)?;
        Ok(encode_response(&response))
    }

    /// Invoke a typed request
    pub fn call(&self, oid: &str, origin: &Origin, request: Request) -> Result<Response> {
        let response = match request {
            Request::Create {
                size,
                order,
                features,
                object_prefix,
            } => {
                self.create(oid, size, order, features, &object_prefix)?;
                Response::Empty
            }
            Request::GetFeatures { snap_id } => {
                Response::Features(self.get_features(oid, snap_id)?)
            }
            Request::GetSize { snap_id } => Response::Size(self.get_size(oid, snap_id)?),
            Request::SetSize { size } => {
                self.set_size(oid, size)?;
                Response::Empty
            }
            Request::GetSnapContext => Response::SnapContext(self.get_snapcontext(oid)?),
            Request::GetObjectPrefix => Response::ObjectPrefix(self.get_object_prefix(oid)?),
            Request::GetSnapshotName { snap_id } => {
                Response::SnapshotName(self.get_snapshot_name(oid, snap_id)?)
            }
            Request::SnapshotAdd { name, snap_id } => {
                self.snapshot_add(oid, &name, snap_id)?;
                Response::Empty
            }
            Request::SnapshotRemove { snap_id } => {
                self.snapshot_remove(oid, snap_id)?;
                Response::Empty
            }
            Request::GetAllFeatures => Response::AllFeatures(self.get_all_features()),
            Request::LockExclusive { cookie } => {
                self.lock_exclusive(oid, origin, &cookie)?;
                Response::Empty
            }
            Request::LockShared { cookie } => {
                self.lock_shared(oid, origin, &cookie)?;
                Response::Empty
            }
            Request::UnlockImage { cookie } => {
                self.unlock_image(oid, origin, &cookie)?;
                Response::Empty
            }
            Request::BreakLock { locker, cookie } => {
                self.break_lock(oid, &locker, &cookie)?;
                Response::Empty
            }
            Request::ListLocks => Response::Locks(self.list_locks(oid)?),
            Request::GetParent { snap_id } => Response::Parent(self.get_parent(oid, snap_id)?),
            Request::SetParent {
                pool,
                image_id,
                snap_id,
                size,
            } => {
                self.set_parent(oid, pool, &image_id, snap_id, size)?;
                Response::Empty
            }
            Request::RemoveParent => {
                self.remove_parent(oid)?;
                Response::Empty
            }
            Request::SnapList => Response::LegacySnaps(self.snap_list(oid)?),
            Request::SnapAdd { name, snap_id } => {
                self.snap_add(oid, &name, snap_id)?;
                Response::Empty
            }
            Request::SnapRemove { name } => {
                self.snap_remove(oid, &name)?;
                Response::Empty
            }
            Request::AssignBid => Response::Bid(self.assign_bid(oid)?),
        };

        Ok(response)
    }

    /// Run `op` as `method` in one transaction on `oid`
    fn run<T, F>(&self, method: Method, oid: &str, op: F) -> Result<T>
    where
        F: FnOnce(&mut ObjectTxn) -> Result<T>,
    {
        tracing::trace!("{} on {}", method.name(), oid);

        self.store
            .transact(oid, method.is_writable(), op)
            .map_err(|e| {
                tracing::debug!("{} on {} failed: {} ({})", method.name(), oid, e, e.code());
                e
            })
    }

    // =========================================================================
    // Image Attributes
    // =========================================================================

    pub fn create(
        &self,
        oid: &str,
        size: u64,
        order: u8,
        features: u64,
        object_prefix: &str,
    ) -> Result<()> {
        self.run(Method::Create, oid, |ctx| {
            attrs::create(ctx, size, order, features, object_prefix)
        })
    }

    pub fn get_features(&self, oid: &str, snap_id: u64) -> Result<ImageFeatures> {
        self.run(Method::GetFeatures, oid, |ctx| attrs::get_features(ctx, snap_id))
    }

    pub fn get_size(&self, oid: &str, snap_id: u64) -> Result<ImageSize> {
        self.run(Method::GetSize, oid, |ctx| attrs::get_size(ctx, snap_id))
    }

    pub fn set_size(&self, oid: &str, size: u64) -> Result<()> {
        self.run(Method::SetSize, oid, |ctx| attrs::set_size(ctx, size))
    }

    pub fn get_object_prefix(&self, oid: &str) -> Result<String> {
        self.run(Method::GetObjectPrefix, oid, |ctx| attrs::get_object_prefix(ctx))
    }

    /// Every feature bit this engine supports
    pub fn get_all_features(&self) -> u64 {
        attrs::get_all_features()
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn get_snapcontext(&self, oid: &str) -> Result<SnapContext> {
        let page_size = self.config.max_keys_read;
        self.run(Method::GetSnapContext, oid, |ctx| {
            snapshot::get_snapcontext(ctx, page_size)
        })
    }

    pub fn get_snapshot_name(&self, oid: &str, snap_id: u64) -> Result<String> {
        self.run(Method::GetSnapshotName, oid, |ctx| {
            snapshot::get_snapshot_name(ctx, snap_id)
        })
    }

    pub fn snapshot_add(&self, oid: &str, name: &str, snap_id: u64) -> Result<()> {
        let page_size = self.config.max_keys_read;
        self.run(Method::SnapshotAdd, oid, |ctx| {
            snapshot::snapshot_add(ctx, name, snap_id, page_size)
        })
    }

    pub fn snapshot_remove(&self, oid: &str, snap_id: u64) -> Result<()> {
        self.run(Method::SnapshotRemove, oid, |ctx| {
            snapshot::snapshot_remove(ctx, snap_id)
        })
    }

    /// Every snapshot record, ascending by id. Not a registered method.
    pub fn list_snapshots(&self, oid: &str) -> Result<Vec<SnapshotRecord>> {
        let page_size = self.config.max_keys_read;
        self.store.transact(oid, false, |ctx| {
            snapshot::list_snapshots(ctx, page_size)
        })
    }

    // =========================================================================
    // Locks
    // =========================================================================

    pub fn lock_exclusive(&self, oid: &str, origin: &Origin, cookie: &str) -> Result<()> {
        self.run(Method::LockExclusive, oid, |ctx| {
            lock::lock(ctx, origin, LockType::Exclusive, cookie)
        })
    }

    pub fn lock_shared(&self, oid: &str, origin: &Origin, cookie: &str) -> Result<()> {
        self.run(Method::LockShared, oid, |ctx| {
            lock::lock(ctx, origin, LockType::Shared, cookie)
        })
    }

    pub fn unlock_image(&self, oid: &str, origin: &Origin, cookie: &str) -> Result<()> {
        self.run(Method::UnlockImage, oid, |ctx| lock::unlock(ctx, origin, cookie))
    }

    pub fn break_lock(&self, oid: &str, locker: &str, cookie: &str) -> Result<()> {
        self.run(Method::BreakLock, oid, |ctx| lock::break_lock(ctx, locker, cookie))
    }

    pub fn list_locks(&self, oid: &str) -> Result<LockList> {
        self.run(Method::ListLocks, oid, |ctx| lock::list_locks(ctx))
    }

    // =========================================================================
    // Clone Parent
    // =========================================================================

    pub fn get_parent(&self, oid: &str, snap_id: u64) -> Result<ParentPointer> {
        self.run(Method::GetParent, oid, |ctx| parent::get_parent(ctx, snap_id))
    }

    pub fn set_parent(
        &self,
        oid: &str,
        pool: i64,
        image_id: &str,
        snap_id: u64,
        size: u64,
    ) -> Result<()> {
        self.run(Method::SetParent, oid, |ctx| {
            parent::set_parent(ctx, pool, image_id, snap_id, size)
        })
    }

    pub fn remove_parent(&self, oid: &str) -> Result<()> {
        self.run(Method::RemoveParent, oid, |ctx| parent::remove_parent(ctx))
    }

    // =========================================================================
    // Old Format
    // =========================================================================

    pub fn snap_list(&self, oid: &str) -> Result<LegacySnapList> {
        let max_reads = self.config.max_header_reads;
        self.run(Method::SnapList, oid, |ctx| legacy::list(ctx, max_reads))
    }

    pub fn snap_add(&self, oid: &str, name: &str, snap_id: u64) -> Result<()> {
        let max_reads = self.config.max_header_reads;
        self.run(Method::SnapAdd, oid, |ctx| {
            legacy::add(ctx, name, snap_id, max_reads)
        })
    }

    pub fn snap_remove(&self, oid: &str, name: &str) -> Result<()> {
        let max_reads = self.config.max_header_reads;
        self.run(Method::SnapRemove, oid, |ctx| {
            legacy::remove(ctx, name, max_reads)
        })
    }

    /// Next block id from the allocator object `oid`
    pub fn assign_bid(&self, oid: &str) -> Result<u64> {
        self.run(Method::AssignBid, oid, |ctx| bid::assign_bid(ctx))
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registered methods
    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }
}
