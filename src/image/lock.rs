//! Cooperative image locks.
//!
//! Lockers are `(entity, cookie)` pairs stored as one set under
//! `lock_lockers`, with a single `lock_type` tag covering the whole set.
//!
//! ```text
//!             lock(exclusive)
//!          ┌──────────────────► Exclusive{1}
//! Unlocked │                        │
//!    ▲     └──────────────────► Shared{n} ◄──┐ lock(shared)
//!    │        lock(shared)          │  └─────┘
//!    └──── last unlock/break ───────┘
//! ```
//!
//! Contention is reported straight away as `Busy`; nothing ever waits.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{RbdError, Result};
use crate::storage::ObjectContext;

use super::{encode_value, guard, keys, read_key, read_optional_key};

/// Stable identity of the caller, supplied by the host for every call
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin(String);

impl Origin {
    pub fn new(entity: impl Into<String>) -> Self {
        Self(entity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Origin {
    fn from(entity: &str) -> Self {
        Self::new(entity)
    }
}

/// Kind of lock being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockType {
    Exclusive,
    Shared,
}

impl LockType {
    /// Tag stored under `lock_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            LockType::Exclusive => "exclusive",
            LockType::Shared => "shared",
        }
    }
}

/// Current holders and whether they hold the image exclusively
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockList {
    pub lockers: BTreeSet<(String, String)>,

    /// Only meaningful while `lockers` is non-empty
    pub exclusive: bool,
}

type Lockers = BTreeSet<(String, String)>;

fn read_lockers<C: ObjectContext + ?Sized>(ctx: &C) -> Result<Option<Lockers>> {
    read_optional_key(ctx, keys::LOCKERS).map_err(|e| {
        tracing::error!("error reading lockers: {}", e);
        e
    })
}

/// Take a lock on the image as `origin` with `cookie`
pub fn lock<C: ObjectContext + ?Sized>(
    ctx: &mut C,
    origin: &Origin,
    kind: LockType,
    cookie: &str,
) -> Result<()> {
    guard::require_features(&*ctx, 0)?;

    tracing::debug!(
        "lock_image {} entity={} cookie={}",
        kind.as_str(),
        origin,
        cookie
    );

    let mut lockers = read_lockers(&*ctx)?.unwrap_or_default();

    if !lockers.is_empty() {
        if kind == LockType::Exclusive {
            tracing::debug!("exclusive lock requested while {} locker(s) hold it", lockers.len());
            return Err(RbdError::Busy("image is locked".to_string()));
        }

        let held: String = read_key(&*ctx, keys::LOCK_TYPE).map_err(|e| {
            tracing::error!("error reading lock type: {}", e);
            e
        })?;
        if held != LockType::Shared.as_str() {
            tracing::debug!("shared lock requested while lock type is {}", held);
            return Err(RbdError::Busy("image is locked exclusively".to_string()));
        }
    }

    if !lockers.insert((origin.to_string(), cookie.to_string())) {
        return Err(RbdError::AlreadyExists(format!(
            "lock held by {} with cookie {}",
            origin, cookie
        )));
    }

    let mut vals = BTreeMap::new();
    vals.insert(keys::LOCKERS.to_string(), encode_value(&lockers)?);
    vals.insert(
        keys::LOCK_TYPE.to_string(),
        encode_value(&kind.as_str().to_string())?,
    );

    ctx.set_vals(vals)
}

/// Release the lock the caller holds under `cookie`
pub fn unlock<C: ObjectContext + ?Sized>(ctx: &mut C, origin: &Origin, cookie: &str) -> Result<()> {
    guard::require_features(&*ctx, 0)?;

    tracing::debug!("unlock_image entity={} cookie={}", origin, cookie);

    release(ctx, origin.as_str(), cookie)
}

/// Release a lock held by any entity
pub fn break_lock<C: ObjectContext + ?Sized>(ctx: &mut C, entity: &str, cookie: &str) -> Result<()> {
    guard::require_features(&*ctx, 0)?;

    tracing::debug!("break_lock entity={} cookie={}", entity, cookie);

    release(ctx, entity, cookie)
}

/// Everyone holding a lock on the image
pub fn list_locks<C: ObjectContext + ?Sized>(ctx: &C) -> Result<LockList> {
    guard::require_features(ctx, 0)?;

    tracing::debug!("list_locks");

    let lockers = match read_lockers(ctx)? {
        Some(lockers) => lockers,
        None => return Ok(LockList::default()),
    };

    let held: String = read_key(ctx, keys::LOCK_TYPE).map_err(|e| {
        tracing::error!("error reading lock type: {}", e);
        e
    })?;

    Ok(LockList {
        lockers,
        exclusive: held == LockType::Exclusive.as_str(),
    })
}

fn release<C: ObjectContext + ?Sized>(ctx: &mut C, entity: &str, cookie: &str) -> Result<()> {
    let mut lockers = read_lockers(&*ctx)?
        .ok_or_else(|| RbdError::NotFound("no lockers".to_string()))?;

    if !lockers.remove(&(entity.to_string(), cookie.to_string())) {
        return Err(RbdError::NotFound(format!(
            "no lock held by {} with cookie {}",
            entity, cookie
        )));
    }

    ctx.set_val(keys::LOCKERS, encode_value(&lockers)?)
}
