//! WebSocket change feed.

mod changes;

pub use changes::{handle_client_frame, ws_changes};
