//! Reconnecting live view.
//!
//! [`LiveView`] runs a [`SessionView`] on a background task. When the feed
//! drops it reports [`ConnectionState::Reconnecting`], backs off, reconnects
//! and resyncs from the fresh snapshot. Anything missed while disconnected is
//! covered by that snapshot; nothing is replayed.

use std::future::Future;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use pinzo_proto::{OwnerId, Record, RecordDraft, RecordId, RecordPatch};

use crate::config::{ClientConfig, ReconnectPolicy};
use crate::error::Error;
use crate::feed::{ChangeFeed, WsFeed};
use crate::view::SessionView;

/// Connection state of a live view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// First connection attempt in progress.
    Connecting,
    /// Snapshot received, changes streaming.
    Live,
    /// Feed lost; records may be stale until the next snapshot.
    Reconnecting,
    /// Stopped for good.
    Closed,
}

/// What a live view currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSnapshot {
    pub state: ConnectionState,
    pub owner: Option<OwnerId>,
    /// Records, newest first.
    pub records: Vec<Record>,
}

enum Command {
    Create(RecordDraft),
    Update(RecordId, RecordPatch),
    Delete(RecordId),
}

/// Self-healing view of one owner's bookmarks.
///
/// Dropping the view stops its task once the commands already queued have
/// been sent, then releases the feed. [`LiveView::close`] does the same and
/// waits for it.
pub struct LiveView {
    snapshots: watch::Receiver<LiveSnapshot>,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl LiveView {
    /// Connect to a Pinzo server over WebSocket.
    pub fn connect(config: ClientConfig) -> Self {
        let policy = config.reconnect;
        Self::spawn(
            move || {
                let config = config.clone();
                async move { WsFeed::connect(&config).await }
            },
            policy,
        )
    }

    /// Run a live view over feeds produced by `connect`, called once per
    /// connection attempt.
    pub fn spawn<C, Fut, F>(connect: C, policy: ReconnectPolicy) -> Self
    where
        C: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<F, Error>> + Send + 'static,
        F: ChangeFeed + 'static,
    {
        let (state_tx, snapshots) = watch::channel(LiveSnapshot {
            state: ConnectionState::Connecting,
            owner: None,
            records: Vec::new(),
        });
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(connect, policy, state_tx, command_rx));

        Self {
            snapshots,
            commands,
            task,
        }
    }

    /// Latest state.
    pub fn snapshot(&self) -> LiveSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshots.borrow().state
    }

    /// A receiver notified on every state or record change.
    pub fn watch(&self) -> watch::Receiver<LiveSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until the view satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&LiveSnapshot) -> bool,
    ) -> Result<LiveSnapshot, Error> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| Error::Closed)?;
        Ok(snapshot.clone())
    }

    /// Queue a create. Commands issued while reconnecting go out once live.
    pub fn create(&self, draft: RecordDraft) -> Result<(), Error> {
        self.command(Command::Create(draft))
    }

    pub fn update(&self, id: RecordId, patch: RecordPatch) -> Result<(), Error> {
        self.command(Command::Update(id, patch))
    }

    pub fn delete(&self, id: RecordId) -> Result<(), Error> {
        self.command(Command::Delete(id))
    }

    /// Send the queued commands, release the feed and wait for the task.
    pub async fn close(self) {
        let LiveView { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "live view task failed");
        }
    }

    fn command(&self, command: Command) -> Result<(), Error> {
        self.commands.send(command).map_err(|_| Error::Closed)
    }
}

enum Outcome {
    /// The owning [`LiveView`] is gone.
    Stop,
    Disconnected(Error),
}

async fn run<C, Fut, F>(
    mut connect: C,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<LiveSnapshot>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) where
    C: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<F, Error>> + Send + 'static,
    F: ChangeFeed + 'static,
{
    let mut attempt: u32 = 0;

    loop {
        // Nobody left to issue commands or read state.
        if commands.is_closed() {
            state_tx.send_modify(|s| s.state = ConnectionState::Closed);
            return;
        }

        let opened = match connect().await {
            Ok(feed) => SessionView::open(feed).await,
            Err(e) => Err(e),
        };

        match opened {
            Ok(mut view) => {
                attempt = 0;
                tracing::info!(owner = %view.owner(), "live view connected");
                publish(&state_tx, ConnectionState::Live, &view);

                match drive(&mut view, &state_tx, &mut commands).await {
                    Outcome::Stop => {
                        let _ = view.close().await;
                        state_tx.send_modify(|s| s.state = ConnectionState::Closed);
                        return;
                    }
                    Outcome::Disconnected(e) => {
                        tracing::warn!(error = %e, "live view disconnected");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "live view connect failed");
            }
        }

        if commands.is_closed() {
            state_tx.send_modify(|s| s.state = ConnectionState::Closed);
            return;
        }

        state_tx.send_modify(|s| s.state = ConnectionState::Reconnecting);
        let delay = policy.delay_for(attempt);
        attempt = attempt.saturating_add(1);
        tracing::debug!(?delay, attempt, "reconnecting");
        tokio::time::sleep(delay).await;
    }
}

async fn drive<F: ChangeFeed>(
    view: &mut SessionView<F>,
    state_tx: &watch::Sender<LiveSnapshot>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Outcome {
    loop {
        tokio::select! {
            update = view.next_update() => match update {
                Ok(update) => {
                    if update.touches_records() {
                        publish(state_tx, ConnectionState::Live, view);
                    }
                }
                Err(e) => return Outcome::Disconnected(e),
            },
            command = commands.recv() => {
                let Some(command) = command else {
                    return Outcome::Stop;
                };
                let sent = match command {
                    Command::Create(draft) => view.create(draft).await,
                    Command::Update(id, patch) => view.update(id, patch).await,
                    Command::Delete(id) => view.delete(id).await,
                };
                match sent {
                    Ok(_) => publish(state_tx, ConnectionState::Live, view),
                    Err(Error::Protocol(e)) => {
                        tracing::warn!(error = %e, "invalid command dropped");
                    }
                    Err(e) => return Outcome::Disconnected(e),
                }
            }
        }
    }
}

fn publish<F: ChangeFeed>(
    state_tx: &watch::Sender<LiveSnapshot>,
    state: ConnectionState,
    view: &SessionView<F>,
) {
    state_tx.send_replace(LiveSnapshot {
        state,
        owner: Some(view.owner().clone()),
        records: view.records().to_vec(),
    });
}
