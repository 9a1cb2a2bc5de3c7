//! Legacy header layout
//!
//! The whole object is one packed little-endian blob:
//!
//! ```text
//! ┌──────────────────────────── header (112) ────────────────────────────┐
//! │ text[40] │ block_name[24] │ signature[4] │ version[8]                │
//! │ order u8 │ crypt_type u8 │ comp_type u8 │ unused u8                  │
//! │ image_size u64 @80 │ snap_seq u64 @88                                │
//! │ snap_count u32 @96 │ reserved u32 @100 │ snap_names_len u64 @104     │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ snap_count × { id u64, image_size u64 }                    (16 each) │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ name\0 name\0 ...                              (snap_names_len bytes) │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entry `i` and name `i` describe the same snapshot. Newest comes first.

use crate::error::{RbdError, Result};

/// Size of the fixed header
pub const HEADER_SIZE: usize = 112;

/// Size of one snapshot entry
pub const SNAP_ENTRY_SIZE: usize = 16;

const TEXT: &[u8] = b"<<< Rados Block Device Image >>>\n";
const SIGNATURE: &[u8] = b"RBD";
const VERSION: &[u8] = b"001.005";

// Field offsets
const TEXT_OFFSET: usize = 0;
const BLOCK_NAME_OFFSET: usize = 40;
const SIGNATURE_OFFSET: usize = 64;
const VERSION_OFFSET: usize = 68;
const ORDER_OFFSET: usize = 76;
const CRYPT_TYPE_OFFSET: usize = 77;
const COMP_TYPE_OFFSET: usize = 78;
const UNUSED_OFFSET: usize = 79;
const IMAGE_SIZE_OFFSET: usize = 80;
const SNAP_SEQ_OFFSET: usize = 88;
const SNAP_COUNT_OFFSET: usize = 96;
const RESERVED_OFFSET: usize = 100;
const SNAP_NAMES_LEN_OFFSET: usize = 104;

/// Fixed-size header at the start of a legacy image object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyHeader {
    pub text: [u8; 40],
    pub block_name: [u8; 24],
    pub signature: [u8; 4],
    pub version: [u8; 8],
    pub order: u8,
    pub crypt_type: u8,
    pub comp_type: u8,
    pub unused: u8,
    pub image_size: u64,
    pub snap_seq: u64,
    pub snap_count: u32,
    pub reserved: u32,
    pub snap_names_len: u64,
}

impl LegacyHeader {
    /// Fresh header for an image with no snapshots
    pub fn new(image_size: u64, order: u8, block_name: &str) -> Self {
        let mut header = Self {
            text: [0; 40],
            block_name: [0; 24],
            signature: [0; 4],
            version: [0; 8],
            order,
            crypt_type: 0,
            comp_type: 0,
            unused: 0,
            image_size,
            snap_seq: 0,
            snap_count: 0,
            reserved: 0,
            snap_names_len: 0,
        };

        header.text[..TEXT.len()].copy_from_slice(TEXT);
        header.signature[..SIGNATURE.len()].copy_from_slice(SIGNATURE);
        header.version[..VERSION.len()].copy_from_slice(VERSION);

        // Keep at least one trailing NUL
        let name = block_name.as_bytes();
        let n = name.len().min(header.block_name.len() - 1);
        header.block_name[..n].copy_from_slice(&name[..n]);

        header
    }

    /// Parse the header from the start of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(RbdError::Corrupt(format!(
                "legacy header truncated: {} bytes, need {}",
                buf.len(),
                HEADER_SIZE
            )));
        }

        Ok(Self {
            text: array_at(buf, TEXT_OFFSET),
            block_name: array_at(buf, BLOCK_NAME_OFFSET),
            signature: array_at(buf, SIGNATURE_OFFSET),
            version: array_at(buf, VERSION_OFFSET),
            order: buf[ORDER_OFFSET],
            crypt_type: buf[CRYPT_TYPE_OFFSET],
            comp_type: buf[COMP_TYPE_OFFSET],
            unused: buf[UNUSED_OFFSET],
            image_size: u64::from_le_bytes(array_at(buf, IMAGE_SIZE_OFFSET)),
            snap_seq: u64::from_le_bytes(array_at(buf, SNAP_SEQ_OFFSET)),
            snap_count: u32::from_le_bytes(array_at(buf, SNAP_COUNT_OFFSET)),
            reserved: u32::from_le_bytes(array_at(buf, RESERVED_OFFSET)),
            snap_names_len: u64::from_le_bytes(array_at(buf, SNAP_NAMES_LEN_OFFSET)),
        })
    }

    /// Append the 112 header bytes to `buf`
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.text);
        buf.extend_from_slice(&self.block_name);
        buf.extend_from_slice(&self.signature);
        buf.extend_from_slice(&self.version);
        buf.push(self.order);
        buf.push(self.crypt_type);
        buf.push(self.comp_type);
        buf.push(self.unused);
        buf.extend_from_slice(&self.image_size.to_le_bytes());
        buf.extend_from_slice(&self.snap_seq.to_le_bytes());
        buf.extend_from_slice(&self.snap_count.to_le_bytes());
        buf.extend_from_slice(&self.reserved.to_le_bytes());
        buf.extend_from_slice(&self.snap_names_len.to_le_bytes());
    }

    /// Total blob length this header declares
    pub fn declared_len(&self) -> u64 {
        blob_len(self.snap_count, self.snap_names_len)
    }
}

/// Blob length for `snap_count` entries and a name table of `names_len` bytes
pub fn blob_len(snap_count: u32, names_len: u64) -> u64 {
    (HEADER_SIZE as u64)
        .saturating_add(u64::from(snap_count) * SNAP_ENTRY_SIZE as u64)
        .saturating_add(names_len)
}

fn array_at<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}

/// One fixed-size snapshot entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacySnap {
    pub id: u64,
    pub image_size: u64,
}

/// Decoded legacy image: header, entries and names in on-disk order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyImage {
    pub header: LegacyHeader,
    pub snaps: Vec<LegacySnap>,
    /// Raw name bytes, without the NUL terminators
    pub names: Vec<Vec<u8>>,
}

impl LegacyImage {
    /// Image with no snapshots
    pub fn new(header: LegacyHeader) -> Self {
        Self {
            header,
            snaps: Vec::new(),
            names: Vec::new(),
        }
    }

    /// Decode a full blob whose header has already been parsed.
    ///
    /// Fails `Corrupt` when the blob is shorter than the header declares or
    /// the name table does not hold exactly `snap_count` NUL-terminated names.
    pub fn decode(header: LegacyHeader, blob: &[u8]) -> Result<Self> {
        let declared = header.declared_len();
        if (blob.len() as u64) < declared {
            return Err(RbdError::Corrupt(format!(
                "legacy image truncated: {} bytes, header declares {}",
                blob.len(),
                declared
            )));
        }

        let count = header.snap_count as usize;
        let names_start = HEADER_SIZE + count * SNAP_ENTRY_SIZE;
        let names_end = declared as usize;

        let snaps = blob[HEADER_SIZE..names_start]
            .chunks_exact(SNAP_ENTRY_SIZE)
            .map(|entry| LegacySnap {
                id: u64::from_le_bytes(array_at(entry, 0)),
                image_size: u64::from_le_bytes(array_at(entry, 8)),
            })
            .collect();

        let names = decode_names(&blob[names_start..names_end], count)?;

        Ok(Self {
            header,
            snaps,
            names,
        })
    }

    /// Encode header, entries and names, refreshing the header's counts
    pub fn encode(&mut self) -> Vec<u8> {
        self.header.snap_count = self.snaps.len() as u32;
        self.header.snap_names_len = self.names.iter().map(|n| n.len() as u64 + 1).sum();

        let mut buf = Vec::with_capacity(self.header.declared_len() as usize);
        self.header.encode_into(&mut buf);

        for snap in &self.snaps {
            buf.extend_from_slice(&snap.id.to_le_bytes());
            buf.extend_from_slice(&snap.image_size.to_le_bytes());
        }

        for name in &self.names {
            buf.extend_from_slice(name);
            buf.push(0);
        }

        buf
    }

    /// Position of the snapshot called `name`
    pub fn find(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.as_slice() == name.as_bytes())
    }
}

fn decode_names(table: &[u8], count: usize) -> Result<Vec<Vec<u8>>> {
    let mut names = Vec::with_capacity(count);
    let mut rest = table;

    while !rest.is_empty() {
        let nul = rest.iter().position(|b| *b == 0).ok_or_else(|| {
            RbdError::Corrupt("legacy snapshot name runs past the name table".to_string())
        })?;

        names.push(rest[..nul].to_vec());
        rest = &rest[nul + 1..];
    }

    if names.len() != count {
        return Err(RbdError::Corrupt(format!(
            "legacy name table holds {} names, header declares {}",
            names.len(),
            count
        )));
    }

    Ok(names)
}
