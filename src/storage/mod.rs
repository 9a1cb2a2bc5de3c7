//! Storage Module
//!
//! Backing-object abstraction the metadata engine runs against.
//!
//! ## Responsibilities
//! - Expose one backing object per transaction through [`ObjectContext`]
//!   (single keys, atomic multi-key writes, paginated key scans, byte reads
//!   and whole-object rewrites)
//! - Commit or discard a transaction as a unit ([`ObjectStore::transact`])
//!
//! ## Object Model
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Backing object (oid)                   │
//! │ ┌────────────────────────────────────┐ │
//! │ │ data: raw bytes (legacy header,    │ │
//! │ │       block-id counter)            │ │
//! │ ├────────────────────────────────────┤ │
//! │ │ omap: ordered key → value pairs    │ │
//! │ │       (new-format attributes)      │ │
//! │ └────────────────────────────────────┘ │
//! └────────────────────────────────────────┘
//! ```
//!
//! ## Removing absent keys
//! [`ObjectContext::remove_key`] succeeds when the key is not present.
//! Operations that must report a missing entity look it up first.

mod file;
mod memory;
mod txn;

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use file::FileStore;
pub use memory::MemStore;
pub use txn::ObjectTxn;

// =============================================================================
// Object State
// =============================================================================

/// Full contents of one backing object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectState {
    /// Raw byte content
    pub data: Vec<u8>,

    /// Ordered key/value attributes
    pub omap: BTreeMap<String, Vec<u8>>,
}

impl ObjectState {
    /// Read up to `len` bytes at `offset` (short read at end of data)
    pub fn read(&self, offset: u64, len: u64) -> Vec<u8> {
        let size = self.data.len() as u64;
        if offset >= size {
            return Vec::new();
        }
        let end = offset.saturating_add(len).min(size);
        self.data[offset as usize..end as usize].to_vec()
    }

    /// Keys strictly after `start_after` that begin with `prefix`, in order
    pub fn scan<'a>(
        &'a self,
        start_after: &'a str,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Vec<u8>)> + 'a {
        self.omap
            .range::<str, _>((Bound::Excluded(start_after), Bound::Unbounded))
            .skip_while(move |(key, _)| key.as_str() < prefix)
            .take_while(move |(key, _)| key.starts_with(prefix))
    }
}

/// Size information for an existing object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    /// Length of the raw byte content
    pub size: u64,
}

/// One page of an ordered key enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Entries in ascending key order
    pub entries: Vec<T>,

    /// Whether further matching keys remain after the last entry
    pub more: bool,
}

impl<T> Page<T> {
    /// Collect at most `max` items, noting whether the iterator had more
    pub fn collect(mut iter: impl Iterator<Item = T>, max: usize) -> Self {
        let entries: Vec<T> = iter.by_ref().take(max).collect();
        let more = iter.next().is_some();
        Self { entries, more }
    }
}

// =============================================================================
// Adapter Traits
// =============================================================================

/// Primitive operations on the single backing object of a transaction
pub trait ObjectContext {
    /// Size of the object; `NotFound` if it does not exist
    fn stat(&self) -> Result<ObjectStat>;

    /// Read a byte range; returns fewer bytes at end of object
    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>>;

    /// Replace the whole byte content (creates the object)
    fn write_full(&mut self, data: &[u8]) -> Result<()>;

    /// Value stored under `key`; `NotFound` if absent
    fn get_val(&self, key: &str) -> Result<Vec<u8>>;

    /// Store a single value (creates the object)
    fn set_val(&mut self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Store several values together (creates the object)
    fn set_vals(&mut self, vals: BTreeMap<String, Vec<u8>>) -> Result<()>;

    /// Remove `key`; succeeds if the key is already absent
    fn remove_key(&mut self, key: &str) -> Result<()>;

    /// Up to `max` keys after `start_after` beginning with `prefix`
    fn get_keys(&self, start_after: &str, prefix: &str, max: usize) -> Result<Page<String>>;

    /// Up to `max` key/value pairs after `start_after` beginning with `prefix`
    fn get_vals(
        &self,
        start_after: &str,
        prefix: &str,
        max: usize,
    ) -> Result<Page<(String, Vec<u8>)>>;
}

/// A collection of backing objects with atomic per-object transactions
pub trait ObjectStore: Send + Sync {
    /// Run `op` against a working copy of object `oid`.
    ///
    /// The copy is committed only if `op` succeeds, `writable` is set and
    /// the transaction changed something. Otherwise the object is untouched.
    fn transact<T, F>(&self, oid: &str, writable: bool, op: F) -> Result<T>
    where
        F: FnOnce(&mut ObjectTxn) -> Result<T>;
}
