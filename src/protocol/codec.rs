//! Protocol codec
//!
//! Encoding and decoding of method inputs and outputs.
//!
//! ## Wire Format
//! - Integers: fixed width, little-endian
//! - Strings: `len (u32)` + bytes (UTF-8)
//! - Sequences: `count (u32)` + elements
//! - Booleans: one byte, 0 or 1
//!
//! Fields appear in the order listed in the method table. Trailing bytes
//! after the last field are ignored.

use std::collections::BTreeSet;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{RbdError, Result};
use crate::image::attrs::{ImageFeatures, ImageSize};
use crate::image::lock::LockList;
use crate::image::parent::ParentPointer;
use crate::image::snapshot::SnapContext;
use crate::legacy::{LegacySnapInfo, LegacySnapList};

use super::{Method, Request, Response};

// =============================================================================
// Primitive Encoder/Decoder
// =============================================================================

/// Append-only writer for wire values
#[derive(Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32_le(value);
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.put_u64_le(value);
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.buf.put_i64_le(value);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(u8::from(value))
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.u32(value.len() as u32);
        self.buf.put_slice(value.as_bytes());
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Bounds-checked reader for wire values
pub struct Decoder<'a> {
    buf: &'a [u8],

    /// Builds the error for malformed input
    fail: fn(String) -> RbdError,
}

impl<'a> Decoder<'a> {
    /// Reader whose failures are reported through `fail`
    pub fn new(buf: &'a [u8], fail: fn(String) -> RbdError) -> Self {
        Self { buf, fail }
    }

    fn need(&self, len: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < len {
            return Err((self.fail)(format!(
                "truncated {}: need {} bytes, have {}",
                what,
                len,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1, "u8")?;
        Ok(self.buf.get_u8())
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.need(4, "u32")?;
        Ok(self.buf.get_u32_le())
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.need(8, "u64")?;
        Ok(self.buf.get_u64_le())
    }

    pub fn i64(&mut self) -> Result<i64> {
        self.need(8, "i64")?;
        Ok(self.buf.get_i64_le())
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err((self.fail)(format!("invalid bool byte {}", other))),
        }
    }

    pub fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        self.need(len, "string")?;
        let (raw, rest) = self.buf.split_at(len);
        self.buf = rest;
        String::from_utf8(raw.to_vec()).map_err(|e| (self.fail)(format!("invalid string: {}", e)))
    }

    /// Element count, checked against the bytes left so a bogus count
    /// cannot force a huge allocation
    pub fn count(&mut self, min_elem_size: usize) -> Result<usize> {
        let count = self.u32()? as usize;
        self.need(count.saturating_mul(min_elem_size), "sequence")?;
        Ok(count)
    }
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request's input payload
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut enc = Encoder::new();

    match request {
        Request::Create {
            size,
            order,
            features,
            object_prefix,
        } => {
            enc.u64(*size).u8(*order).u64(*features).str(object_prefix);
        }
        Request::GetFeatures { snap_id }
        | Request::GetSize { snap_id }
        | Request::GetSnapshotName { snap_id }
        | Request::SnapshotRemove { snap_id }
        | Request::GetParent { snap_id } => {
            enc.u64(*snap_id);
        }
        Request::SetSize { size } => {
            enc.u64(*size);
        }
        Request::SnapshotAdd { name, snap_id } | Request::SnapAdd { name, snap_id } => {
            enc.str(name).u64(*snap_id);
        }
        Request::LockExclusive { cookie }
        | Request::LockShared { cookie }
        | Request::UnlockImage { cookie } => {
            enc.str(cookie);
        }
        Request::BreakLock { locker, cookie } => {
            enc.str(locker).str(cookie);
        }
        Request::SetParent {
            pool,
            image_id,
            snap_id,
            size,
        } => {
            enc.i64(*pool).str(image_id).u64(*snap_id).u64(*size);
        }
        Request::SnapRemove { name } => {
            enc.str(name);
        }
        Request::GetSnapContext
        | Request::GetObjectPrefix
        | Request::GetAllFeatures
        | Request::ListLocks
        | Request::RemoveParent
        | Request::SnapList
        | Request::AssignBid => {}
    }

    enc.finish()
}

/// Decode the input payload of `method`; malformed input is `InvalidArgument`
pub fn decode_request(method: Method, bytes: &[u8]) -> Result<Request> {
    let mut dec = Decoder::new(bytes, RbdError::InvalidArgument);

    let request = match method {
        Method::Create => Request::Create {
            size: dec.u64()?,
            order: dec.u8()?,
            features: dec.u64()?,
            object_prefix: dec.string()?,
        },
        Method::GetFeatures => Request::GetFeatures {
            snap_id: dec.u64()?,
        },
        Method::GetSize => Request::GetSize {
            snap_id: dec.u64()?,
        },
        Method::SetSize => Request::SetSize { size: dec.u64()? },
        Method::GetSnapContext => Request::GetSnapContext,
        Method::GetObjectPrefix => Request::GetObjectPrefix,
        Method::GetSnapshotName => Request::GetSnapshotName {
            snap_id: dec.u64()?,
        },
        Method::SnapshotAdd => Request::SnapshotAdd {
            name: dec.string()?,
            snap_id: dec.u64()?,
        },
        Method::SnapshotRemove => Request::SnapshotRemove {
            snap_id: dec.u64()?,
        },
        Method::GetAllFeatures => Request::GetAllFeatures,
        Method::LockExclusive => Request::LockExclusive {
            cookie: dec.string()?,
        },
        Method::LockShared => Request::LockShared {
            cookie: dec.string()?,
        },
        Method::UnlockImage => Request::UnlockImage {
            cookie: dec.string()?,
        },
        Method::BreakLock => Request::BreakLock {
            locker: dec.string()?,
            cookie: dec.string()?,
        },
        Method::ListLocks => Request::ListLocks,
        Method::GetParent => Request::GetParent {
            snap_id: dec.u64()?,
        },
        Method::SetParent => Request::SetParent {
            pool: dec.i64()?,
            image_id: dec.string()?,
            snap_id: dec.u64()?,
            size: dec.u64()?,
        },
        Method::RemoveParent => Request::RemoveParent,
        Method::SnapList => Request::SnapList,
        Method::SnapAdd => Request::SnapAdd {
            name: dec.string()?,
            snap_id: dec.u64()?,
        },
        Method::SnapRemove => Request::SnapRemove {
            name: dec.string()?,
        },
        Method::AssignBid => Request::AssignBid,
    };

    Ok(request)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response's output payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut enc = Encoder::new();

    match response {
        Response::Empty => {}
        Response::Features(features) => {
            enc.u64(features.features).u64(features.incompatible);
        }
        Response::Size(size) => {
            enc.u8(size.order).u64(size.size);
        }
        Response::SnapContext(snapc) => {
            enc.u64(snapc.seq).u32(snapc.snaps.len() as u32);
            for id in &snapc.snaps {
                enc.u64(*id);
            }
        }
        Response::ObjectPrefix(s) | Response::SnapshotName(s) => {
            enc.str(s);
        }
        Response::AllFeatures(value) | Response::Bid(value) => {
            enc.u64(*value);
        }
        Response::Locks(locks) => {
            enc.u32(locks.lockers.len() as u32);
            for (entity, cookie) in &locks.lockers {
                enc.str(entity).str(cookie);
            }
            enc.bool(locks.exclusive);
        }
        Response::Parent(parent) => {
            enc.i64(parent.pool)
                .str(&parent.image_id)
                .u64(parent.snap_id)
                .u64(parent.overlap);
        }
        Response::LegacySnaps(list) => {
            enc.u64(list.snap_seq).u32(list.snaps.len() as u32);
            for snap in &list.snaps {
                enc.u64(snap.id).u64(snap.image_size).str(&snap.name);
            }
        }
    }

    enc.finish()
}

/// Decode the output payload of `method`; malformed output is `Corrupt`
pub fn decode_response(method: Method, bytes: &[u8]) -> Result<Response> {
    let mut dec = Decoder::new(bytes, RbdError::Corrupt);

    let response = match method {
        Method::GetFeatures => Response::Features(ImageFeatures {
            features: dec.u64()?,
            incompatible: dec.u64()?,
        }),
        Method::GetSize => Response::Size(ImageSize {
            order: dec.u8()?,
            size: dec.u64()?,
        }),
        Method::GetSnapContext => {
            let seq = dec.u64()?;
            let count = dec.count(8)?;
            let snaps = (0..count).map(|_| dec.u64()).collect::<Result<Vec<_>>>()?;
            Response::SnapContext(SnapContext { seq, snaps })
        }
        Method::GetObjectPrefix => Response::ObjectPrefix(dec.string()?),
        Method::GetSnapshotName => Response::SnapshotName(dec.string()?),
        Method::GetAllFeatures => Response::AllFeatures(dec.u64()?),
        Method::ListLocks => {
            let count = dec.count(8)?;
            let mut lockers = BTreeSet::new();
            for _ in 0..count {
                lockers.insert((dec.string()?, dec.string()?));
            }
            Response::Locks(LockList {
                lockers,
                exclusive: dec.bool()?,
            })
        }
        Method::GetParent => Response::Parent(ParentPointer {
            pool: dec.i64()?,
            image_id: dec.string()?,
            snap_id: dec.u64()?,
            overlap: dec.u64()?,
        }),
        Method::SnapList => {
            let snap_seq = dec.u64()?;
            let count = dec.count(20)?;
            let mut snaps = Vec::with_capacity(count);
            for _ in 0..count {
                snaps.push(LegacySnapInfo {
                    id: dec.u64()?,
                    image_size: dec.u64()?,
                    name: dec.string()?,
                });
            }
            Response::LegacySnaps(LegacySnapList { snap_seq, snaps })
        }
        Method::AssignBid => Response::Bid(dec.u64()?),
        Method::Create
        | Method::SetSize
        | Method::SnapshotAdd
        | Method::SnapshotRemove
        | Method::LockExclusive
        | Method::LockShared
        | Method::UnlockImage
        | Method::BreakLock
        | Method::SetParent
        | Method::RemoveParent
        | Method::SnapAdd
        | Method::SnapRemove => Response::Empty,
    };

    Ok(response)
}
