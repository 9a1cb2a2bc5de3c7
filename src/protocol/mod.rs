//! Protocol Module
//!
//! Method table entries and the payload encoding used by remote callers.
//!
//! ## Call Flow
//! ```text
//! caller                                  engine
//!   │  (oid, method name, input bytes)      │
//!   ├──────────────────────────────────────►│ lookup  ─► UnknownMethod
//!   │                                       │ decode  ─► InvalidArgument
//!   │                                       │ run in one transaction
//!   │◄──────────────────────────────────────┤ encode
//!   │  output bytes | signed error code     │
//! ```
//!
//! ## Methods
//! - `create`, `get_features`, `get_size`, `set_size`, `get_snapcontext`,
//!   `get_object_prefix`, `get_snapshot_name`, `snapshot_add`,
//!   `snapshot_remove`, `get_all_features`
//! - `lock_exclusive`, `lock_shared`, `unlock_image`, `break_lock`, `list_locks`
//! - `get_parent`, `set_parent`, `remove_parent`
//! - `snap_list`, `snap_add`, `snap_remove`, `assign_bid` (old format)

mod codec;
mod command;
mod response;

pub use codec::{decode_request, decode_response, encode_request, encode_response};
pub use codec::{Decoder, Encoder};
pub use command::{flags, Method, Request};
pub use response::Response;
