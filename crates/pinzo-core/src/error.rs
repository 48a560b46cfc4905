//! Core error types.

use pinzo_proto::RecordId;
use thiserror::Error;

/// Record store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Protocol error, including failed validation of drafts and patches.
    #[error("protocol error: {0}")]
    Protocol(#[from] pinzo_proto::Error),

    /// Record not found for this owner.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// The backing store rejected or failed the operation.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether the caller supplied bad input, as opposed to a store fault.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}
