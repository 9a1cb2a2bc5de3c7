//! File-backed object store
//!
//! One framed file per object. Commits replace the file atomically.
//!
//! ## File Format
//! ```text
//! ┌──────────┬───────────┬──────────┬──────────────────────────┐
//! │Magic (4) │Version (2)│ CRC (4)  │ bincode(ObjectState)     │
//! └──────────┴───────────┴──────────┴──────────────────────────┘
//! ```
//! CRC32 covers the payload only.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{RbdError, Result};

use super::{ObjectState, ObjectStore, ObjectTxn};

/// Magic bytes identifying an object file
const MAGIC: &[u8; 4] = b"RBDO";

/// Current object file format version
const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + CRC (4) = 10 bytes
const HEADER_SIZE: usize = 10;

/// Object store persisting each object as a file under a root directory
///
/// ## Concurrency:
/// - Each transaction holds an advisory lock on `{oid}.lock`
///   (shared for read-only calls, exclusive for writable ones)
/// - Commits go to `{oid}.obj.tmp` and are renamed over `{oid}.obj`
/// - Read-only calls on a missing object take no lock and create no files
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open or create a store rooted at `path`
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;
        Ok(Self {
            root: path.to_path_buf(),
        })
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn validate_oid(oid: &str) -> Result<()> {
        if oid.is_empty() || oid.starts_with('.') || oid.contains(['/', '\\']) {
            return Err(RbdError::InvalidArgument(format!(
                "invalid object name {:?}",
                oid
            )));
        }
        Ok(())
    }

    fn object_path(&self, oid: &str) -> PathBuf {
        self.root.join(format!("{}.obj", oid))
    }

    fn lock_path(&self, oid: &str) -> PathBuf {
        self.root.join(format!("{}.lock", oid))
    }

    fn load(path: &Path) -> Result<Option<ObjectState>> {
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(path)?;
        if bytes.len() < HEADER_SIZE {
            return Err(RbdError::Corrupt(format!(
                "object file {} truncated: {} bytes",
                path.display(),
                bytes.len()
            )));
        }

        if &bytes[0..4] != MAGIC {
            return Err(RbdError::Corrupt(format!(
                "invalid object file magic in {}: {:?}",
                path.display(),
                &bytes[0..4]
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(RbdError::Corrupt(format!(
                "unsupported object file version {} in {}",
                version,
                path.display()
            )));
        }

        let stored_crc = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let payload = &bytes[HEADER_SIZE..];
        let actual_crc = crc32fast::hash(payload);
        if stored_crc != actual_crc {
            return Err(RbdError::Corrupt(format!(
                "checksum mismatch in {}: stored {:#010x}, computed {:#010x}",
                path.display(),
                stored_crc,
                actual_crc
            )));
        }

        let state = bincode::deserialize(payload)
            .map_err(|e| RbdError::Corrupt(format!("decoding {}: {}", path.display(), e)))?;
        Ok(Some(state))
    }

    fn commit(path: &Path, state: Option<&ObjectState>) -> Result<()> {
        let state = match state {
            Some(state) => state,
            None => {
                if path.exists() {
                    fs::remove_file(path)?;
                }
                return Ok(());
            }
        };

        let payload =
            bincode::serialize(state).map_err(|e| RbdError::Serialization(e.to_string()))?;

        let mut framed = Vec::with_capacity(HEADER_SIZE + payload.len());
        framed.extend_from_slice(MAGIC);
        framed.extend_from_slice(&VERSION.to_le_bytes());
        framed.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        framed.extend_from_slice(&payload);

        let tmp_path = path.with_extension("obj.tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&framed)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        Ok(())
    }
}

impl ObjectStore for FileStore {
    fn transact<T, F>(&self, oid: &str, writable: bool, op: F) -> Result<T>
    where
        F: FnOnce(&mut ObjectTxn) -> Result<T>,
    {
        Self::validate_oid(oid)?;

        let path = self.object_path(oid);

        // Reads of a missing object need no lock file
        if !writable && !path.exists() {
            let mut txn = ObjectTxn::new(oid, None);
            let out = op(&mut txn)?;
            if txn.is_dirty() {
                tracing::warn!("discarding writes from read-only transaction on {}", oid);
            }
            return Ok(out);
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path(oid))?;
        if writable {
            FileExt::lock_exclusive(&lock_file)?;
        } else {
            FileExt::lock_shared(&lock_file)?;
        }

        let mut txn = ObjectTxn::new(oid, Self::load(&path)?);
        let out = op(&mut txn)?;

        if txn.is_dirty() {
            if writable {
                Self::commit(&path, txn.into_state().as_ref())?;
            } else {
                tracing::warn!("discarding writes from read-only transaction on {}", oid);
            }
        }

        // lock_file drops here, releasing the advisory lock
        Ok(out)
    }
}
