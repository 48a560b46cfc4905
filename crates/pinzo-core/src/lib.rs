//! Pinzo Core - record store and change log.
//!
//! The record store is the storage collaborator the server writes through.
//! Every successful mutation is appended to the [`ChangeLog`], whose
//! listeners forward events to the live relay.

pub mod changelog;
pub mod error;
pub mod store;

pub use changelog::{ChangeListener, ChangeLog, ChangeLogEntry};
pub use error::Error;
pub use store::{MemoryStore, RecordStore, SharedRecordStore};

/// Re-export protocol types.
pub use pinzo_proto as proto;
