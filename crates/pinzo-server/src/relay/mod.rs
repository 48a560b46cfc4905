//! Change relay: per-owner fan-out of change events to live subscribers.
//!
//! Writers call [`ChangeRelay::publish`] and never wait on delivery. Each
//! subscriber holds a [`Subscription`] stream that only yields events for the
//! owner it subscribed to. Nothing is buffered for subscribers that are not
//! connected, and nothing is replayed.

mod manager;
mod subscription;

pub use manager::{ChangeRelay, RelayStats};
pub use subscription::{Subscription, SubscriptionInfo};

/// Default per-subscription buffer, in events.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;
