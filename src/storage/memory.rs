//! In-memory object store
//!
//! Keeps every object in a map behind a single RwLock.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::Result;

use super::{ObjectState, ObjectStore, ObjectTxn};

/// Object store held entirely in memory
///
/// ## Concurrency:
/// - Writable transactions hold the write lock from first read to commit,
///   so every call observes and replaces a consistent object
/// - Read-only transactions share the read lock
#[derive(Default)]
pub struct MemStore {
    objects: RwLock<HashMap<String, ObjectState>>,
}

impl MemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of an object's contents (for testing and debugging)
    pub fn object(&self, oid: &str) -> Option<ObjectState> {
        self.objects.read().get(oid).cloned()
    }

    /// Install an object's contents directly, bypassing any method
    pub fn insert_object(&self, oid: impl Into<String>, state: ObjectState) {
        self.objects.write().insert(oid.into(), state);
    }

    /// Number of objects that exist
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }
}

impl ObjectStore for MemStore {
    fn transact<T, F>(&self, oid: &str, writable: bool, op: F) -> Result<T>
    where
        F: FnOnce(&mut ObjectTxn) -> Result<T>,
    {
        if !writable {
            let objects = self.objects.read();
            let mut txn = ObjectTxn::new(oid, objects.get(oid).cloned());
            let out = op(&mut txn)?;
            if txn.is_dirty() {
                tracing::warn!("discarding writes from read-only transaction on {}", oid);
            }
            return Ok(out);
        }

        let mut objects = self.objects.write();
        let mut txn = ObjectTxn::new(oid, objects.get(oid).cloned());
        let out = op(&mut txn)?;

        if txn.is_dirty() {
            match txn.into_state() {
                Some(state) => {
                    objects.insert(oid.to_string(), state);
                }
                None => {
                    objects.remove(oid);
                }
            }
        }

        Ok(out)
    }
}
