//! Change Data Capture (CDC) processing.
//!
//! This module provides a background task that drains change log entries
//! appended by the record store and publishes them to the [`ChangeRelay`]
//! for subscriber delivery. Writers only pay for a channel send.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pinzo_core::{ChangeLog, ChangeLogEntry};

use crate::relay::ChangeRelay;

/// CDC event processor that bridges the change log to the relay.
///
/// Entries are handled by a single consumer in LSN order, so per-owner
/// publish order matches the order mutations took effect in the store.
pub struct CdcProcessor {
    /// Receiver for change log entries.
    rx: mpsc::UnboundedReceiver<ChangeLogEntry>,
    /// Relay for event distribution.
    relay: ChangeRelay,
}

impl CdcProcessor {
    /// Create a new CDC processor.
    pub fn new(rx: mpsc::UnboundedReceiver<ChangeLogEntry>, relay: ChangeRelay) -> Self {
        Self { rx, relay }
    }

    /// Run the CDC processor until every sender is gone.
    pub async fn run(mut self) {
        info!("CDC processor started");

        while let Some(entry) = self.rx.recv().await {
            self.process_entry(entry);
        }

        info!("CDC processor stopped (channel closed)");
    }

    fn process_entry(&self, entry: ChangeLogEntry) {
        debug!(
            lsn = entry.lsn,
            owner = %entry.owner_id,
            kind = ?entry.event.kind(),
            "processing CDC entry"
        );

        self.relay.publish(&entry.owner_id, entry.event);
    }
}

/// Register a change log listener feeding a new CDC processor task.
///
/// The listener holds the only sender, so the task runs for as long as the
/// change log lives.
pub fn start_processor(changelog: &ChangeLog, relay: ChangeRelay) -> JoinHandle<()> {
    let (tx, rx) = mpsc::unbounded_channel();

    changelog.add_listener(move |entry: &ChangeLogEntry| {
        if tx.send(entry.clone()).is_err() {
            warn!(lsn = entry.lsn, "CDC processor gone, change not relayed");
        }
    });

    let processor = CdcProcessor::new(rx, relay);
    tokio::spawn(processor.run())
}
