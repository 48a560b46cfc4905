//! Change feed frames.
//!
//! One WebSocket carries both directions. The server opens with a
//! [`ServerMessage::Snapshot`], then streams [`ServerMessage::Change`] frames
//! and answers client requests with `Ack` or `Rejected`.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::event::ChangeEvent;
use crate::record::{OwnerId, Record, RecordDraft, RecordId, RecordPatch};

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Full state for the session owner, newest first.
    Snapshot {
        owner_id: OwnerId,
        records: Vec<Record>,
    },
    /// A live change for the session owner.
    Change { event: ChangeEvent },
    /// A client request succeeded.
    Ack {
        request_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record: Option<Record>,
    },
    /// A client request failed. Only the requesting connection sees this.
    Rejected {
        request_id: u64,
        code: u32,
        message: String,
    },
    /// Reply to [`ClientMessage::Ping`].
    Pong,
    /// A frame could not be understood.
    Error { message: String },
}

/// Frames sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    Create {
        request_id: u64,
        #[serde(flatten)]
        draft: RecordDraft,
    },
    Update {
        request_id: u64,
        id: RecordId,
        #[serde(flatten)]
        patch: RecordPatch,
    },
    Delete {
        request_id: u64,
        id: RecordId,
    },
    Ping,
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Request id, for frames that expect an answer correlated by id.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Self::Create { request_id, .. }
            | Self::Update { request_id, .. }
            | Self::Delete { request_id, .. } => Some(*request_id),
            Self::Ping => None,
        }
    }
}

/// Error codes carried by [`ServerMessage::Rejected`].
pub mod error_codes {
    /// Unknown/internal error.
    pub const INTERNAL: u32 = 1;
    /// Invalid request format or field values.
    pub const INVALID_REQUEST: u32 = 2;
    /// Record not found for this owner.
    pub const NOT_FOUND: u32 = 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_frame_is_flat() {
        let msg = ClientMessage::Create {
            request_id: 7,
            draft: RecordDraft::new("Rust", "https://rust-lang.org"),
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "CREATE");
        assert_eq!(json["request_id"], 7);
        assert_eq!(json["title"], "Rust");
        assert_eq!(json["target_uri"], "https://rust-lang.org");
    }

    #[test]
    fn test_update_frame_with_partial_patch() {
        let id = RecordId::new();
        let text = format!(
            r#"{{"type":"UPDATE","request_id":3,"id":"{}","title":"Renamed"}}"#,
            id
        );
        let msg = ClientMessage::from_json(&text).unwrap();

        assert_eq!(
            msg,
            ClientMessage::Update {
                request_id: 3,
                id,
                patch: RecordPatch::title("Renamed"),
            }
        );
        assert_eq!(msg.request_id(), Some(3));
    }

    #[test]
    fn test_server_frames_parse() {
        let msg = ServerMessage::from_json(r#"{"type":"PONG"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Pong);

        let msg = ServerMessage::from_json(
            r#"{"type":"REJECTED","request_id":9,"code":3,"message":"record not found"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ServerMessage::Rejected { request_id: 9, code: error_codes::NOT_FOUND, .. }
        ));
    }

    #[test]
    fn test_snapshot_names_owner() {
        let msg = ServerMessage::Snapshot {
            owner_id: OwnerId::new("alice"),
            records: vec![],
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "SNAPSHOT");
        assert_eq!(json["owner_id"], "alice");
        assert_eq!(json["records"], serde_json::json!([]));
    }

    #[test]
    fn test_unknown_frame_rejected() {
        assert!(matches!(
            ClientMessage::from_json(r#"{"type":"EXPLODE"}"#),
            Err(Error::Deserialization(_))
        ));
    }
}
