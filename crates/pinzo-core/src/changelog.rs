//! In-memory change log for change data capture.
//!
//! The record store appends one entry per successful mutation while it still
//! holds its write lock, so log order matches the order in which mutations
//! took effect. Registered listeners are invoked synchronously on append and
//! must not block; the server's listener only hands the entry to a channel.
//!
//! ```text
//! Write Path:
//!   store.insert() → records.write() → changelog.append() → listeners → return
//!
//! CDC Path:
//!   listener → channel → relay.publish() → subscribers
//! ```
//!
//! Entries are not retained. A listener registered after an append never
//! sees that entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use pinzo_proto::{ChangeEvent, OwnerId};

/// A change recorded by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLogEntry {
    /// Log sequence number, strictly increasing per log.
    pub lsn: u64,
    /// Append time in microseconds since the Unix epoch.
    pub timestamp: u64,
    /// Owner the change is scoped to.
    pub owner_id: OwnerId,
    /// The change itself.
    pub event: ChangeEvent,
}

/// Callback invoked for every appended entry.
pub type ChangeListener = Arc<dyn Fn(&ChangeLogEntry) + Send + Sync>;

/// Sequence-numbered change log with synchronous listeners.
pub struct ChangeLog {
    /// Current (highest assigned) LSN.
    current_lsn: AtomicU64,
    listeners: RwLock<Vec<ChangeListener>>,
}

impl ChangeLog {
    /// Create an empty change log.
    pub fn new() -> Self {
        Self {
            current_lsn: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener for entries appended from now on.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&ChangeLogEntry) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Append an event and notify listeners. Returns the assigned LSN.
    pub fn append(&self, owner_id: &OwnerId, event: ChangeEvent) -> u64 {
        let lsn = self.current_lsn.fetch_add(1, Ordering::SeqCst) + 1;
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);

        let entry = ChangeLogEntry {
            lsn,
            timestamp,
            owner_id: owner_id.clone(),
            event,
        };

        tracing::trace!(
            lsn,
            owner = %entry.owner_id,
            kind = ?entry.event.kind(),
            "change appended"
        );

        for listener in self.listeners.read().iter() {
            listener(&entry);
        }

        lsn
    }

    /// Highest LSN assigned so far, 0 if nothing was appended.
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn.load(Ordering::SeqCst)
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::new()
    }
}
