//! Session view: one reconciler driven by one change feed.

use std::collections::HashMap;

use pinzo_proto::{
    ChangeEvent, ClientMessage, OwnerId, Record, RecordDraft, RecordId, RecordPatch, ServerMessage,
};

use crate::error::Error;
use crate::feed::ChangeFeed;
use crate::reconciler::{Applied, Reconciler, Rollback};

/// What one server frame did to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    /// State replaced by a snapshot.
    Resynced { count: usize },
    /// A live change was merged.
    Changed { event: ChangeEvent, applied: Applied },
    /// A request of ours succeeded.
    Acked {
        request_id: u64,
        record: Option<Record>,
    },
    /// A request of ours failed.
    Rejected {
        request_id: u64,
        code: u32,
        message: String,
        /// Whether an optimistic change was undone.
        rolled_back: bool,
    },
    Pong,
    /// The server could not process something we sent.
    ServerError(String),
}

impl ViewUpdate {
    /// Whether the visible record list may have changed.
    pub fn touches_records(&self) -> bool {
        match self {
            ViewUpdate::Resynced { .. } => true,
            ViewUpdate::Changed { applied, .. } => applied.changed(),
            ViewUpdate::Rejected { rolled_back, .. } => *rolled_back,
            _ => false,
        }
    }
}

/// Live, reconciled view of one owner's records.
///
/// Frames are processed one at a time by whoever calls
/// [`SessionView::next_update`]. Mutations are sent with a request id; update
/// and delete are applied locally right away and undone if the server
/// rejects them. The feed is released by [`SessionView::close`] or on drop.
pub struct SessionView<F: ChangeFeed> {
    reconciler: Reconciler,
    feed: F,
    next_request_id: u64,
    in_flight: HashMap<u64, Option<Rollback>>,
}

impl<F: ChangeFeed> SessionView<F> {
    /// Wait for the initial snapshot on `feed` and build the view from it.
    pub async fn open(mut feed: F) -> Result<Self, Error> {
        loop {
            match feed.recv().await? {
                Some(ServerMessage::Snapshot { owner_id, records }) => {
                    tracing::debug!(owner = %owner_id, count = records.len(), "snapshot received");
                    return Ok(Self {
                        reconciler: Reconciler::seeded(owner_id, records),
                        feed,
                        next_request_id: 1,
                        in_flight: HashMap::new(),
                    });
                }
                Some(ServerMessage::Error { message }) => {
                    return Err(Error::UnexpectedFrame(message));
                }
                Some(other) => {
                    tracing::debug!(frame = ?other, "ignoring frame before snapshot");
                }
                None => return Err(Error::Closed),
            }
        }
    }

    pub fn owner(&self) -> &OwnerId {
        self.reconciler.owner()
    }

    /// Current records, newest first.
    pub fn records(&self) -> &[Record] {
        self.reconciler.records()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Requests sent and not yet answered.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Receive and process the next frame.
    ///
    /// Returns [`Error::Closed`] once the feed has ended. Cancel safe.
    pub async fn next_update(&mut self) -> Result<ViewUpdate, Error> {
        match self.feed.recv().await? {
            Some(message) => Ok(self.handle(message)),
            None => Err(Error::Closed),
        }
    }

    /// Process one server frame.
    pub fn handle(&mut self, message: ServerMessage) -> ViewUpdate {
        match message {
            ServerMessage::Snapshot { owner_id, records } => {
                if &owner_id != self.reconciler.owner() {
                    tracing::warn!(owner = %owner_id, "snapshot for a different owner, switching");
                    self.reconciler = Reconciler::new(owner_id);
                }
                self.reconciler.resync(records);
                ViewUpdate::Resynced {
                    count: self.reconciler.len(),
                }
            }
            ServerMessage::Change { event } => {
                let applied = self.reconciler.apply(&event);
                tracing::trace!(id = %event.record_id(), ?applied, "change applied");
                ViewUpdate::Changed { event, applied }
            }
            ServerMessage::Ack { request_id, record } => {
                if let Some(Some(token)) = self.in_flight.remove(&request_id) {
                    self.reconciler.settle(&token);
                }
                ViewUpdate::Acked { request_id, record }
            }
            ServerMessage::Rejected {
                request_id,
                code,
                message,
            } => {
                let rolled_back = match self.in_flight.remove(&request_id) {
                    Some(Some(token)) => self.reconciler.rollback(token),
                    _ => false,
                };
                tracing::debug!(request_id, code, %message, rolled_back, "request rejected");
                ViewUpdate::Rejected {
                    request_id,
                    code,
                    message,
                    rolled_back,
                }
            }
            ServerMessage::Pong => ViewUpdate::Pong,
            ServerMessage::Error { message } => {
                tracing::warn!(%message, "server error frame");
                ViewUpdate::ServerError(message)
            }
        }
    }

    /// Ask the server to create a bookmark. It appears once its insert event
    /// arrives. Returns the request id.
    pub async fn create(&mut self, draft: RecordDraft) -> Result<u64, Error> {
        let draft = draft.validate()?;
        let request_id = self.allocate_request_id();
        self.submit(ClientMessage::Create { request_id, draft }, None).await?;
        Ok(request_id)
    }

    /// Update a bookmark, showing the change immediately.
    pub async fn update(&mut self, id: RecordId, patch: RecordPatch) -> Result<u64, Error> {
        let patch = patch.validate()?;
        let token = match self.reconciler.get(id) {
            Some(current) => {
                let next = current.patched(patch.clone())?;
                self.reconciler.replace_local(next)
            }
            None => None,
        };

        let request_id = self.allocate_request_id();
        self.submit(
            ClientMessage::Update {
                request_id,
                id,
                patch,
            },
            token,
        )
        .await?;
        Ok(request_id)
    }

    /// Delete a bookmark, hiding it immediately.
    pub async fn delete(&mut self, id: RecordId) -> Result<u64, Error> {
        let token = self.reconciler.remove_local(id);
        let request_id = self.allocate_request_id();
        self.submit(ClientMessage::Delete { request_id, id }, token).await?;
        Ok(request_id)
    }

    pub async fn ping(&mut self) -> Result<(), Error> {
        self.feed.send(ClientMessage::Ping).await
    }

    /// Release the feed.
    pub async fn close(mut self) -> Result<(), Error> {
        self.feed.close().await
    }

    fn allocate_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    async fn submit(
        &mut self,
        message: ClientMessage,
        token: Option<Rollback>,
    ) -> Result<(), Error> {
        let request_id = message.request_id().unwrap_or_default();
        match self.feed.send(message).await {
            Ok(()) => {
                self.in_flight.insert(request_id, token);
                Ok(())
            }
            Err(e) => {
                if let Some(token) = token {
                    self.reconciler.rollback(token);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{channel_feed, ChannelFeed, FeedPeer};
    use pinzo_proto::error_codes;

    fn record(owner: &OwnerId, title: &str) -> Record {
        Record::create(owner.clone(), RecordDraft::new(title, "https://example.com")).unwrap()
    }

    async fn open_with(records: Vec<Record>) -> (SessionView<ChannelFeed>, FeedPeer) {
        let (feed, peer) = channel_feed();
        peer.to_client
            .send(ServerMessage::Snapshot {
                owner_id: OwnerId::new("alice"),
                records,
            })
            .unwrap();
        (SessionView::open(feed).await.unwrap(), peer)
    }

    #[tokio::test]
    async fn test_open_waits_for_snapshot() {
        let alice = OwnerId::new("alice");
        let a = record(&alice, "a");
        let (view, _peer) = open_with(vec![a.clone()]).await;

        assert_eq!(view.owner(), &alice);
        assert_eq!(view.records(), &[a]);
    }

    #[tokio::test]
    async fn test_open_fails_when_feed_ends() {
        let (feed, peer) = channel_feed();
        drop(peer);
        assert!(matches!(SessionView::open(feed).await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_changes_are_merged() {
        let alice = OwnerId::new("alice");
        let (mut view, peer) = open_with(vec![]).await;

        let a = record(&alice, "a");
        peer.to_client
            .send(ServerMessage::Change {
                event: ChangeEvent::insert(a.clone()),
            })
            .unwrap();
        peer.to_client
            .send(ServerMessage::Change {
                event: ChangeEvent::insert(record(&OwnerId::new("bob"), "b")),
            })
            .unwrap();

        let first = view.next_update().await.unwrap();
        assert!(first.touches_records());
        let second = view.next_update().await.unwrap();
        assert!(!second.touches_records());

        assert_eq!(view.records(), &[a]);
    }

    #[tokio::test]
    async fn test_rejected_delete_rolls_back() {
        let alice = OwnerId::new("alice");
        let a = record(&alice, "a");
        let (mut view, mut peer) = open_with(vec![a.clone()]).await;

        let request_id = view.delete(a.id).await.unwrap();
        assert!(view.records().is_empty());
        assert_eq!(
            peer.from_client.recv().await,
            Some(ClientMessage::Delete { request_id, id: a.id })
        );

        peer.to_client
            .send(ServerMessage::Rejected {
                request_id,
                code: error_codes::INTERNAL,
                message: "store unavailable".to_string(),
            })
            .unwrap();

        let update = view.next_update().await.unwrap();
        assert!(matches!(update, ViewUpdate::Rejected { rolled_back: true, .. }));
        assert_eq!(view.records(), &[a]);
        assert_eq!(view.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_acked_update_stays() {
        let alice = OwnerId::new("alice");
        let a = record(&alice, "a");
        let (mut view, peer) = open_with(vec![a.clone()]).await;

        let request_id = view.update(a.id, RecordPatch::title("renamed")).await.unwrap();
        assert_eq!(view.records()[0].title, "renamed");

        peer.to_client
            .send(ServerMessage::Ack {
                request_id,
                record: None,
            })
            .unwrap();
        view.next_update().await.unwrap();

        // A late rejection for the same id changes nothing.
        peer.to_client
            .send(ServerMessage::Rejected {
                request_id,
                code: error_codes::INTERNAL,
                message: "late".to_string(),
            })
            .unwrap();
        let update = view.next_update().await.unwrap();
        assert!(matches!(update, ViewUpdate::Rejected { rolled_back: false, .. }));
        assert_eq!(view.records()[0].title, "renamed");
    }

    #[tokio::test]
    async fn test_send_failure_rolls_back() {
        let alice = OwnerId::new("alice");
        let a = record(&alice, "a");
        let (mut view, peer) = open_with(vec![a.clone()]).await;
        drop(peer);

        assert!(view.delete(a.id).await.is_err());
        assert_eq!(view.records(), &[a]);
        assert_eq!(view.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_not_sent() {
        let (mut view, mut peer) = open_with(vec![]).await;

        assert!(matches!(
            view.create(RecordDraft::new("  ", "https://x")).await,
            Err(Error::Protocol(_))
        ));
        view.ping().await.unwrap();
        assert_eq!(peer.from_client.recv().await, Some(ClientMessage::Ping));
    }

    #[tokio::test]
    async fn test_close_releases_feed() {
        let (view, mut peer) = open_with(vec![]).await;
        view.close().await.unwrap();
        assert!(peer.from_client.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_releases_feed() {
        let (view, mut peer) = open_with(vec![]).await;
        drop(view);
        assert!(peer.from_client.recv().await.is_none());
    }
}
