//! Relay manager for handling subscriptions and publishing events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use pinzo_proto::{ChangeEvent, OwnerId};

use super::subscription::{Subscription, SubscriptionInfo};
use super::DEFAULT_SUBSCRIBER_BUFFER;

/// A registered delivery target.
struct Subscriber {
    id: u64,
    tx: mpsc::Sender<ChangeEvent>,
    created_at: Instant,
    events_sent: u64,
}

pub(super) struct RelayInner {
    /// Live subscribers keyed by owner. Fan-out for one owner happens under
    /// that owner's entry lock, so every subscriber sees the same order.
    topics: DashMap<OwnerId, Vec<Subscriber>>,
    next_subscription_id: AtomicU64,
    buffer: usize,
    events_published: AtomicU64,
    lagged_drops: AtomicU64,
}

impl RelayInner {
    /// Drop a subscriber registration. Returns whether it was still present.
    pub(super) fn remove(&self, owner: &OwnerId, subscription_id: u64) -> bool {
        let (removed, now_empty) = match self.topics.get_mut(owner) {
            Some(mut subs) => {
                let before = subs.len();
                subs.retain(|s| s.id != subscription_id);
                (subs.len() != before, subs.is_empty())
            }
            None => (false, false),
        };

        if now_empty {
            self.topics.remove_if(owner, |_, subs| subs.is_empty());
        }

        if removed {
            tracing::debug!(subscription_id, owner = %owner, "subscription removed");
        }
        removed
    }
}

/// Per-owner change relay.
///
/// Cheap to clone; clones share the same subscriber registry.
#[derive(Clone)]
pub struct ChangeRelay {
    inner: Arc<RelayInner>,
}

/// Relay counters, exposed by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub active_subscriptions: usize,
    pub owners: usize,
    pub events_published: u64,
    pub lagged_drops: u64,
}

impl ChangeRelay {
    /// Create a relay with the default per-subscription buffer.
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_SUBSCRIBER_BUFFER)
    }

    /// Create a relay whose subscriptions buffer at most `buffer` events.
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                topics: DashMap::new(),
                next_subscription_id: AtomicU64::new(1),
                buffer: buffer.max(1),
                events_published: AtomicU64::new(0),
                lagged_drops: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to changes for `owner`.
    ///
    /// The registration lives until the returned handle is closed or dropped.
    pub fn subscribe(&self, owner: &OwnerId) -> Subscription {
        let subscription_id = self.inner.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(self.inner.buffer);

        self.inner
            .topics
            .entry(owner.clone())
            .or_default()
            .push(Subscriber {
                id: subscription_id,
                tx,
                created_at: Instant::now(),
                events_sent: 0,
            });

        tracing::debug!(subscription_id, owner = %owner, "subscription created");

        Subscription::new(subscription_id, owner.clone(), rx, Arc::downgrade(&self.inner))
    }

    /// Publish a change event to every live subscriber of `owner`.
    ///
    /// Never blocks. A subscriber whose buffer is full is dropped instead of
    /// silently missing the event; its stream ends and it has to resync.
    /// Returns the number of subscribers the event was handed to.
    pub fn publish(&self, owner: &OwnerId, event: ChangeEvent) -> usize {
        self.inner.events_published.fetch_add(1, Ordering::Relaxed);

        let (delivered, now_empty) = {
            let Some(mut subs) = self.inner.topics.get_mut(owner) else {
                tracing::trace!(owner = %owner, "no subscribers for owner");
                return 0;
            };

            let mut delivered = 0;
            subs.retain_mut(|sub| match sub.tx.try_send(event.clone()) {
                Ok(()) => {
                    sub.events_sent += 1;
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    self.inner.lagged_drops.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        subscription_id = sub.id,
                        owner = %owner,
                        events_sent = sub.events_sent,
                        "subscriber lagging, dropping subscription"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscription_id = sub.id, owner = %owner, "subscriber gone");
                    false
                }
            });
            (delivered, subs.is_empty())
        };

        if now_empty {
            self.inner.topics.remove_if(owner, |_, subs| subs.is_empty());
        }

        tracing::trace!(
            owner = %owner,
            kind = ?event.kind(),
            delivered,
            "published change event"
        );

        delivered
    }

    /// Get the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.topics.iter().map(|subs| subs.len()).sum()
    }

    /// Get subscriptions for a specific owner.
    pub fn subscriptions_for_owner(&self, owner: &OwnerId) -> Vec<SubscriptionInfo> {
        self.inner
            .topics
            .get(owner)
            .map(|subs| {
                subs.iter()
                    .map(|s| SubscriptionInfo {
                        id: s.id,
                        owner_id: owner.clone(),
                        age_secs: s.created_at.elapsed().as_secs(),
                        events_sent: s.events_sent,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of the relay counters.
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            active_subscriptions: self.subscription_count(),
            owners: self.inner.topics.len(),
            events_published: self.inner.events_published.load(Ordering::Relaxed),
            lagged_drops: self.inner.lagged_drops.load(Ordering::Relaxed),
        }
    }
}

impl Default for ChangeRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use pinzo_proto::{Record, RecordDraft};

    fn insert_event(owner: &OwnerId, title: &str) -> ChangeEvent {
        ChangeEvent::insert(
            Record::create(owner.clone(), RecordDraft::new(title, "https://example.com")).unwrap(),
        )
    }

    fn title_of(event: &ChangeEvent) -> &str {
        match event {
            ChangeEvent::Insert { record } | ChangeEvent::Update { record } => &record.title,
            ChangeEvent::Delete { .. } => "",
        }
    }

    #[tokio::test]
    async fn test_subscribe_unsubscribe() {
        let relay = ChangeRelay::new();
        let owner = OwnerId::new("user-1");

        let sub = relay.subscribe(&owner);
        assert_eq!(relay.subscription_count(), 1);
        assert_eq!(relay.subscriptions_for_owner(&owner)[0].id, sub.id());

        sub.close();

        assert_eq!(relay.subscription_count(), 0);
        assert!(relay.subscriptions_for_owner(&owner).is_empty());
        assert_eq!(relay.stats().owners, 0);
    }

    #[tokio::test]
    async fn test_drop_releases_registration() {
        let relay = ChangeRelay::new();
        let owner = OwnerId::new("user-1");

        {
            let _sub = relay.subscribe(&owner);
            assert_eq!(relay.subscription_count(), 1);
        }

        assert_eq!(relay.subscription_count(), 0);
        assert_eq!(relay.publish(&owner, insert_event(&owner, "a")), 0);
    }

    #[tokio::test]
    async fn test_publish_fans_out_to_owner_only() {
        let relay = ChangeRelay::new();
        let alice = OwnerId::new("alice");
        let bob = OwnerId::new("bob");

        let mut tab1 = relay.subscribe(&alice);
        let mut tab2 = relay.subscribe(&alice);
        let mut other = relay.subscribe(&bob);

        assert_eq!(relay.publish(&alice, insert_event(&alice, "a")), 2);

        assert_eq!(title_of(&tab1.next().await.unwrap()), "a");
        assert_eq!(title_of(&tab2.next().await.unwrap()), "a");
        assert!(other.try_next_event().is_none());
    }

    #[tokio::test]
    async fn test_publish_order_preserved() {
        let relay = ChangeRelay::new();
        let owner = OwnerId::new("user-1");
        let mut sub = relay.subscribe(&owner);

        for title in ["1", "2", "3", "4"] {
            relay.publish(&owner, insert_event(&owner, title));
        }

        let mut titles = Vec::new();
        for _ in 0..4 {
            titles.push(title_of(&sub.next().await.unwrap()).to_string());
        }
        assert_eq!(titles, vec!["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscriber() {
        let relay = ChangeRelay::new();
        let owner = OwnerId::new("user-1");

        relay.publish(&owner, insert_event(&owner, "early"));
        let mut sub = relay.subscribe(&owner);
        relay.publish(&owner, insert_event(&owner, "late"));

        assert_eq!(title_of(&sub.next().await.unwrap()), "late");
        assert!(sub.try_next_event().is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_dropped() {
        let relay = ChangeRelay::with_buffer(2);
        let owner = OwnerId::new("user-1");
        let mut slow = relay.subscribe(&owner);

        relay.publish(&owner, insert_event(&owner, "1"));
        relay.publish(&owner, insert_event(&owner, "2"));
        // Buffer is full: the subscription is evicted rather than skipping "3".
        assert_eq!(relay.publish(&owner, insert_event(&owner, "3")), 0);

        assert_eq!(relay.subscription_count(), 0);
        assert_eq!(relay.stats().lagged_drops, 1);

        // Buffered events drain, then the stream ends so the client resyncs.
        assert_eq!(title_of(&slow.next().await.unwrap()), "1");
        assert_eq!(title_of(&slow.next().await.unwrap()), "2");
        assert!(slow.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let relay = ChangeRelay::new();
        let alice = OwnerId::new("alice");
        let bob = OwnerId::new("bob");
        let _a1 = relay.subscribe(&alice);
        let _a2 = relay.subscribe(&alice);
        let _b1 = relay.subscribe(&bob);

        relay.publish(&alice, insert_event(&alice, "x"));

        let stats = relay.stats();
        assert_eq!(stats.active_subscriptions, 3);
        assert_eq!(stats.owners, 2);
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.lagged_drops, 0);
    }
}
