//! Client-side reconciliation of change events.
//!
//! A [`Reconciler`] holds the newest-first list of one owner's records and
//! merges change events into it. Merging is keyed by record id and is
//! idempotent, so an event delivered twice (for example once in a snapshot
//! and once live) leaves the same state as delivering it once. Events for
//! other owners are never surfaced.
//!
//! Local, optimistic edits return a [`Rollback`] token. Rolling back
//! restores the previous state unless a later event changed or removed the
//! same record first; the latest arrival wins. An update for a record that
//! was removed locally only refreshes what a rollback would put back.

use std::collections::{HashMap, HashSet};

use pinzo_proto::{ChangeEvent, OwnerId, Record, RecordId};

/// What an event did to the local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New record prepended.
    Inserted,
    /// Existing record replaced in place.
    Updated,
    /// Record removed.
    Removed,
    /// Insert for a record already present; nothing changed.
    Duplicate,
    /// Update or delete for a record not present; nothing changed.
    Missing,
    /// Event for another owner's record; ignored.
    ForeignOwner,
}

impl Applied {
    /// Whether the local state changed.
    pub fn changed(self) -> bool {
        matches!(self, Applied::Inserted | Applied::Updated | Applied::Removed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Restore {
    /// Put a locally removed record back near its old position.
    Reinsert { index: usize, record: Record },
    /// Put back the version a local replace overwrote.
    Replace { previous: Record },
}

/// An outstanding local change and how to undo it.
#[derive(Debug, Clone)]
struct Pending {
    epoch: u64,
    restore: Restore,
}

/// Handle to one optimistic local change.
///
/// The undo state lives in the [`Reconciler`], so events that arrive while
/// the change is in flight keep it current.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a rollback token does nothing unless passed to rollback or settle"]
pub struct Rollback {
    id: RecordId,
    epoch: u64,
}

impl Rollback {
    /// Record the local change touched.
    pub fn record_id(&self) -> RecordId {
        self.id
    }
}

/// Newest-first record list for one owner.
#[derive(Debug, Clone)]
pub struct Reconciler {
    owner: OwnerId,
    records: Vec<Record>,
    /// Outstanding local changes, by record. A later local change replaces
    /// the entry and an event that changes or removes the record clears it,
    /// which makes older tokens stale.
    pending: HashMap<RecordId, Pending>,
    epoch: u64,
}

impl Reconciler {
    /// Create an empty reconciler for `owner`.
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            records: Vec::new(),
            pending: HashMap::new(),
            epoch: 0,
        }
    }

    /// Create a reconciler seeded with a newest-first snapshot.
    pub fn seeded(owner: OwnerId, snapshot: Vec<Record>) -> Self {
        let mut reconciler = Self::new(owner);
        reconciler.resync(snapshot);
        reconciler
    }

    /// Owner whose records this reconciler holds.
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Current records, newest first.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Number of local changes that can still be rolled back.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Replace the whole state with a fresh snapshot.
    ///
    /// Foreign-owner records are dropped and duplicate ids keep their first
    /// occurrence. Outstanding rollback tokens become stale.
    pub fn resync(&mut self, snapshot: Vec<Record>) {
        let mut seen = HashSet::with_capacity(snapshot.len());
        self.records = snapshot
            .into_iter()
            .filter(|r| r.is_owned_by(&self.owner))
            .filter(|r| seen.insert(r.id))
            .collect();
        self.pending.clear();
    }

    /// Merge one change event.
    pub fn apply(&mut self, event: &ChangeEvent) -> Applied {
        let applied = match event {
            ChangeEvent::Insert { record } => {
                if !record.is_owned_by(&self.owner) {
                    return Applied::ForeignOwner;
                }
                if self.position(record.id).is_some() {
                    Applied::Duplicate
                } else {
                    self.records.insert(0, record.clone());
                    Applied::Inserted
                }
            }
            ChangeEvent::Update { record } => {
                if !record.is_owned_by(&self.owner) {
                    return Applied::ForeignOwner;
                }
                match self.position(record.id) {
                    Some(index) => {
                        self.records[index] = record.clone();
                        Applied::Updated
                    }
                    None => Applied::Missing,
                }
            }
            // Deletes carry no record to check; removing by id is safe
            // because only this owner's records are ever held.
            ChangeEvent::Delete { previous_id, .. } => match self.position(*previous_id) {
                Some(index) => {
                    self.records.remove(index);
                    Applied::Removed
                }
                None => Applied::Missing,
            },
        };

        self.supersede(event, applied);
        applied
    }

    /// Settle the pending local change for the event's record against what
    /// the event did.
    fn supersede(&mut self, event: &ChangeEvent, applied: Applied) {
        let id = event.record_id();
        match (event, applied) {
            // Removed here but still alive upstream: keep the newer version
            // for a rollback.
            (ChangeEvent::Update { record }, Applied::Missing) => {
                if let Some(Pending {
                    restore: Restore::Reinsert { record: kept, .. },
                    ..
                }) = self.pending.get_mut(&id)
                {
                    *kept = record.clone();
                }
            }
            (ChangeEvent::Delete { .. }, _) => {
                self.pending.remove(&id);
            }
            (_, applied) if applied.changed() => {
                self.pending.remove(&id);
            }
            _ => {}
        }
    }

    /// Optimistically remove a record before the server confirms.
    ///
    /// Returns `None` if the record is not present.
    pub fn remove_local(&mut self, id: RecordId) -> Option<Rollback> {
        let index = self.position(id)?;
        let record = self.records.remove(index);
        Some(self.track(id, Restore::Reinsert { index, record }))
    }

    /// Optimistically replace a record before the server confirms.
    ///
    /// Returns `None` if the record is not present or belongs to someone else.
    pub fn replace_local(&mut self, record: Record) -> Option<Rollback> {
        if !record.is_owned_by(&self.owner) {
            return None;
        }
        let index = self.position(record.id)?;
        let id = record.id;
        let previous = std::mem::replace(&mut self.records[index], record);
        Some(self.track(id, Restore::Replace { previous }))
    }

    /// Undo an optimistic change.
    ///
    /// Returns false, changing nothing, if a later event or local change for
    /// the same record superseded it, or it was already settled.
    pub fn rollback(&mut self, token: Rollback) -> bool {
        let Some(pending) = self.take_pending(&token) else {
            return false;
        };

        match pending.restore {
            Restore::Reinsert { index, record } => {
                if self.position(record.id).is_none() {
                    let index = index.min(self.records.len());
                    self.records.insert(index, record);
                }
            }
            Restore::Replace { previous } => {
                if let Some(index) = self.position(previous.id) {
                    self.records[index] = previous;
                }
            }
        }
        true
    }

    /// Forget an optimistic change the server confirmed.
    pub fn settle(&mut self, token: &Rollback) {
        self.take_pending(token);
    }

    fn track(&mut self, id: RecordId, restore: Restore) -> Rollback {
        self.epoch += 1;
        self.pending.insert(
            id,
            Pending {
                epoch: self.epoch,
                restore,
            },
        );
        Rollback {
            id,
            epoch: self.epoch,
        }
    }

    fn take_pending(&mut self, token: &Rollback) -> Option<Pending> {
        match self.pending.get(&token.id) {
            Some(pending) if pending.epoch == token.epoch => self.pending.remove(&token.id),
            _ => None,
        }
    }

    fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }
}
