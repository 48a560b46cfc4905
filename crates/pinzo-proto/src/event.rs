//! Change events.
//!
//! A change event is emitted once per successful mutation against the record
//! store. Events are not persisted: a subscriber only ever sees events
//! published while it is subscribed.

use serde::{Deserialize, Serialize};

use crate::record::{OwnerId, Record, RecordId};

/// A mutation, as seen by live subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeEvent {
    /// A record was created.
    Insert {
        /// Snapshot of the new record.
        record: Record,
    },
    /// A record's mutable fields changed.
    Update {
        /// Snapshot after the update.
        record: Record,
    },
    /// A record was removed.
    Delete {
        /// Id the record had before removal.
        previous_id: RecordId,
        /// Owner of the removed record, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner_id: Option<OwnerId>,
    },
}

/// Discriminant of a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeEvent {
    pub fn insert(record: Record) -> Self {
        Self::Insert { record }
    }

    pub fn update(record: Record) -> Self {
        Self::Update { record }
    }

    pub fn delete(previous: &Record) -> Self {
        Self::Delete {
            previous_id: previous.id,
            owner_id: Some(previous.owner_id.clone()),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert { .. } => ChangeKind::Insert,
            Self::Update { .. } => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// Id of the record this event is about.
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Insert { record } | Self::Update { record } => record.id,
            Self::Delete { previous_id, .. } => *previous_id,
        }
    }

    /// Owner the event is scoped to, if the event carries one.
    pub fn owner_id(&self) -> Option<&OwnerId> {
        match self {
            Self::Insert { record } | Self::Update { record } => Some(&record.owner_id),
            Self::Delete { owner_id, .. } => owner_id.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordDraft;

    fn record() -> Record {
        Record::create(OwnerId::new("user-1"), RecordDraft::new("A", "https://a")).unwrap()
    }

    #[test]
    fn test_tagged_wire_shape() {
        let record = record();
        let json = serde_json::to_value(ChangeEvent::insert(record.clone())).unwrap();
        assert_eq!(json["type"], "INSERT");
        assert_eq!(json["record"]["title"], "A");

        let json = serde_json::to_value(ChangeEvent::delete(&record)).unwrap();
        assert_eq!(json["type"], "DELETE");
        assert_eq!(json["previous_id"], record.id.to_string());
        assert_eq!(json["owner_id"], "user-1");
    }

    #[test]
    fn test_delete_without_owner_parses() {
        let id = RecordId::new();
        let json = format!(r#"{{"type":"DELETE","previous_id":"{}"}}"#, id);
        let event: ChangeEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.kind(), ChangeKind::Delete);
        assert_eq!(event.record_id(), id);
        assert!(event.owner_id().is_none());
    }

    #[test]
    fn test_accessors() {
        let record = record();
        let event = ChangeEvent::update(record.clone());
        assert_eq!(event.kind(), ChangeKind::Update);
        assert_eq!(event.record_id(), record.id);
        assert_eq!(event.owner_id(), Some(&record.owner_id));
    }
}
