//! Pinzo protocol types.
//!
//! This crate defines the bookmark data model and the JSON messages exchanged
//! between the server and live clients.
//!
//! # Modules
//!
//! - [`record`] - Bookmark records and the drafts/patches used to write them
//! - [`event`] - Change events emitted once per successful mutation
//! - [`message`] - Frames sent over the change feed in both directions
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! Every wire type is serde-enabled and tagged with an upper-case `type` field:
//!
//! ```ignore
//! use pinzo_proto::{ServerMessage, ChangeEvent};
//!
//! let frame = ServerMessage::Change { event };
//! let text = frame.to_json()?;
//! let decoded = ServerMessage::from_json(&text)?;
//! ```

pub mod error;
pub mod event;
pub mod message;
pub mod record;

pub use error::Error;

pub use event::{ChangeEvent, ChangeKind};
pub use message::{error_codes, ClientMessage, ServerMessage};
pub use record::{sort_newest_first, OwnerId, Record, RecordDraft, RecordId, RecordPatch};

/// Protocol version advertised by the health endpoint.
///
/// Bump when a frame changes shape in a way old clients cannot parse.
pub const PROTOCOL_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_version() {
        assert_eq!(PROTOCOL_VERSION, 1);
    }
}
