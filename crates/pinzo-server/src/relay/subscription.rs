//! Subscription handles.

use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use pinzo_proto::{ChangeEvent, OwnerId};

use super::manager::RelayInner;

/// A live, owner-scoped stream of change events.
///
/// The stream is lazy and not restartable. It ends only when the relay drops
/// the subscription (lagging subscriber) or the relay itself goes away.
/// The relay registration is released exactly once: on [`Subscription::close`]
/// or on drop, whichever comes first.
pub struct Subscription {
    id: u64,
    owner_id: OwnerId,
    rx: mpsc::Receiver<ChangeEvent>,
    relay: Weak<RelayInner>,
    released: bool,
}

impl Subscription {
    pub(super) fn new(
        id: u64,
        owner_id: OwnerId,
        rx: mpsc::Receiver<ChangeEvent>,
        relay: Weak<RelayInner>,
    ) -> Self {
        Self {
            id,
            owner_id,
            rx,
            relay,
            released: false,
        }
    }

    /// Relay-assigned subscription id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Owner this subscription is scoped to.
    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    /// Take an already-delivered event without waiting.
    pub fn try_next_event(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    /// Release the relay registration now.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.rx.close();
        if let Some(relay) = self.relay.upgrade() {
            relay.remove(&self.owner_id, self.id);
        }
    }
}

impl Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("released", &self.released)
            .finish()
    }
}

/// Read-only view of a registered subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionInfo {
    /// Unique subscription ID.
    pub id: u64,
    /// Owner being watched.
    pub owner_id: OwnerId,
    /// Seconds since the subscription was created.
    pub age_secs: u64,
    /// Number of events handed to this subscription.
    pub events_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::super::ChangeRelay;
    use super::*;

    #[test]
    fn test_release_is_idempotent() {
        let relay = ChangeRelay::new();
        let owner = OwnerId::new("user-1");
        let keep = relay.subscribe(&owner);
        let mut sub = relay.subscribe(&owner);

        sub.release();
        sub.release();
        drop(sub);

        // Only the released subscription went away.
        let remaining = relay.subscriptions_for_owner(&owner);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id());
    }

    #[test]
    fn test_outlives_relay() {
        let owner = OwnerId::new("user-1");
        let mut sub = ChangeRelay::new().subscribe(&owner);

        // Relay is gone: nothing to deregister from and nothing will arrive.
        assert!(sub.try_next_event().is_none());
        sub.close();
    }
}
