//! # rbdmeta
//!
//! Metadata engine for versioned block-device images whose metadata lives on
//! a single backing object:
//! - Image attributes (size, order, features, object prefix)
//! - Monotonically sequenced snapshot table with paginated scans
//! - Clone parent pointer with overlap bookkeeping
//! - Cooperative exclusive/shared locks
//! - Legacy packed-header snapshots and the block-id allocator
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Host / rbdmeta-cli                           │
//! │          (oid, origin, method name, input bytes)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Engine                                  │
//! │         (method table, protocol codec, dispatch)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  one transaction per call
//!          ┌────────────┼──────────────┐
//!          ▼            ▼              ▼
//!   ┌────────────┐ ┌──────────┐ ┌────────────┐
//!   │   image    │ │  legacy  │ │    bid     │
//!   │ attrs/snap │ │  header  │ │ allocator  │
//!   │ parent/lock│ │  codec   │ │            │
//!   └─────┬──────┘ └────┬─────┘ └─────┬──────┘
//!         └─────────────┼─────────────┘
//!                       ▼
//!              ┌─────────────────┐
//!              │     storage     │
//!              │ MemStore /      │
//!              │ FileStore       │
//!              └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod image;
pub mod legacy;
pub mod bid;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RbdError, Result};
pub use config::Config;
pub use engine::{Engine, MethodTable};
pub use image::lock::{LockType, Origin};
pub use image::{features, MAXSNAP, NOSNAP};
pub use storage::{FileStore, MemStore, ObjectContext, ObjectStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rbdmeta
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
