//! Error types for rbdmeta
//!
//! Provides a unified error type for all operations. Every variant maps to
//! a signed error code (see [`RbdError::code`]) which is what a hosting
//! dispatcher hands back to a remote caller.

use thiserror::Error;

/// Result type alias using RbdError
pub type Result<T> = std::result::Result<T, RbdError>;

/// Unified error type for rbdmeta operations
#[derive(Debug, Error)]
pub enum RbdError {
    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    // -------------------------------------------------------------------------
    // Entity Errors
    // -------------------------------------------------------------------------
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Stale snapshot id {id}: image snap_seq is {snap_seq}")]
    Stale { id: u64, snap_seq: u64 },

    // -------------------------------------------------------------------------
    // Lock Errors
    // -------------------------------------------------------------------------
    #[error("Busy: {0}")]
    Busy(String),

    // -------------------------------------------------------------------------
    // Feature Errors
    // -------------------------------------------------------------------------
    /// `have` is `None` when the image predates the feature system.
    #[error("Missing required features: need {need:#x}, have {have:?}")]
    MissingFeatures { need: u64, have: Option<u64> },

    #[error("Unsupported features requested: {0:#x}")]
    UnsupportedFeatures(u64),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt metadata: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RbdError {
    /// Signed error code reported to remote callers
    pub fn code(&self) -> i32 {
        match self {
            RbdError::InvalidArgument(_) => -22,
            RbdError::UnknownMethod(_) => -95,
            RbdError::NotFound(_) => -2,
            RbdError::AlreadyExists(_) => -17,
            RbdError::Stale { .. } => -116,
            RbdError::Busy(_) => -16,
            RbdError::MissingFeatures { .. } => -8,
            RbdError::UnsupportedFeatures(_) => -38,
            RbdError::Io(_) | RbdError::Corrupt(_) | RbdError::Serialization(_) => -5,
        }
    }

    /// Whether this error reports a missing entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, RbdError::NotFound(_))
    }
}
