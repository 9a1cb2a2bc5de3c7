//! Object Transaction
//!
//! Working copy of one backing object for the duration of a single call.

use std::collections::BTreeMap;

use crate::error::{RbdError, Result};

use super::{ObjectContext, ObjectStat, ObjectState, Page};

/// Working copy handed to a method while its store transaction is open
pub struct ObjectTxn {
    /// Name of the object being operated on
    oid: String,

    /// Current contents (`None` while the object does not exist)
    state: Option<ObjectState>,

    /// Set once any write has been applied
    dirty: bool,
}

impl ObjectTxn {
    /// Start a transaction over `state` (`None` for a missing object)
    pub fn new(oid: impl Into<String>, state: Option<ObjectState>) -> Self {
        Self {
            oid: oid.into(),
            state,
            dirty: false,
        }
    }

    /// Whether the transaction wrote anything
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Final contents to commit
    pub fn into_state(self) -> Option<ObjectState> {
        self.state
    }

    fn existing(&self) -> Result<&ObjectState> {
        self.state
            .as_ref()
            .ok_or_else(|| RbdError::NotFound(format!("object {}", self.oid)))
    }

    fn materialize(&mut self) -> &mut ObjectState {
        self.dirty = true;
        self.state.get_or_insert_with(ObjectState::default)
    }
}

impl ObjectContext for ObjectTxn {
    fn stat(&self) -> Result<ObjectStat> {
        let state = self.existing()?;
        Ok(ObjectStat {
            size: state.data.len() as u64,
        })
    }

    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        Ok(self.existing()?.read(offset, len))
    }

    fn write_full(&mut self, data: &[u8]) -> Result<()> {
        self.materialize().data = data.to_vec();
        Ok(())
    }

    fn get_val(&self, key: &str) -> Result<Vec<u8>> {
        self.existing()?
            .omap
            .get(key)
            .cloned()
            .ok_or_else(|| RbdError::NotFound(format!("key {}", key)))
    }

    fn set_val(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        self.materialize().omap.insert(key.to_string(), value);
        Ok(())
    }

    fn set_vals(&mut self, vals: BTreeMap<String, Vec<u8>>) -> Result<()> {
        self.materialize().omap.extend(vals);
        Ok(())
    }

    fn remove_key(&mut self, key: &str) -> Result<()> {
        self.existing()?;
        let state = self.materialize();
        state.omap.remove(key);
        Ok(())
    }

    fn get_keys(&self, start_after: &str, prefix: &str, max: usize) -> Result<Page<String>> {
        let state = self.existing()?;
        Ok(Page::collect(
            state.scan(start_after, prefix).map(|(key, _)| key.clone()),
            max,
        ))
    }

    fn get_vals(
        &self,
        start_after: &str,
        prefix: &str,
        max: usize,
    ) -> Result<Page<(String, Vec<u8>)>> {
        let state = self.existing()?;
        Ok(Page::collect(
            state
                .scan(start_after, prefix)
                .map(|(key, value)| (key.clone(), value.clone())),
            max,
        ))
    }
}
