//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] pinzo_proto::Error),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// The feed is closed; nothing more will arrive.
    #[error("change feed closed")]
    Closed,

    /// The server did not send the expected frame.
    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),
}
