//! Record store.
//!
//! [`RecordStore`] is the storage seam: CRUD over records keyed by id and
//! scoped by owner. A record owned by someone else behaves exactly like a
//! missing one, so the store never confirms that a foreign id exists.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use pinzo_proto::{
    sort_newest_first, ChangeEvent, OwnerId, Record, RecordDraft, RecordId, RecordPatch,
};

use crate::changelog::ChangeLog;
use crate::error::Error;

/// Owner-scoped record storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record for `owner`.
    async fn insert(&self, owner: &OwnerId, draft: RecordDraft) -> Result<Record, Error>;

    /// Apply a patch to one of `owner`'s records.
    async fn update_by_id(
        &self,
        owner: &OwnerId,
        id: RecordId,
        patch: RecordPatch,
    ) -> Result<Record, Error>;

    /// Remove one of `owner`'s records, returning it.
    async fn delete_by_id(&self, owner: &OwnerId, id: RecordId) -> Result<Record, Error>;

    /// All of `owner`'s records, newest first.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Record>, Error>;

    /// One of `owner`'s records.
    async fn get(&self, owner: &OwnerId, id: RecordId) -> Result<Record, Error>;
}

/// Shared record store handle.
pub type SharedRecordStore = Arc<dyn RecordStore>;

/// In-memory record store.
///
/// Every successful mutation is appended to the change log while the write
/// lock is held, so the log reflects the order mutations took effect.
pub struct MemoryStore {
    records: RwLock<HashMap<RecordId, Record>>,
    changelog: Arc<ChangeLog>,
}

impl MemoryStore {
    /// Create an empty store with its own change log.
    pub fn new() -> Self {
        Self::with_changelog(Arc::new(ChangeLog::new()))
    }

    /// Create an empty store appending to `changelog`.
    pub fn with_changelog(changelog: Arc<ChangeLog>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            changelog,
        }
    }

    /// The change log this store appends to.
    pub fn changelog(&self) -> &Arc<ChangeLog> {
        &self.changelog
    }

    /// Total number of records across all owners.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, owner: &OwnerId, draft: RecordDraft) -> Result<Record, Error> {
        let record = Record::create(owner.clone(), draft)?;

        let mut records = self.records.write();
        records.insert(record.id, record.clone());
        self.changelog.append(owner, ChangeEvent::insert(record.clone()));

        tracing::debug!(id = %record.id, owner = %owner, "record inserted");
        Ok(record)
    }

    async fn update_by_id(
        &self,
        owner: &OwnerId,
        id: RecordId,
        patch: RecordPatch,
    ) -> Result<Record, Error> {
        let mut records = self.records.write();
        let current = records
            .get_mut(&id)
            .filter(|r| r.is_owned_by(owner))
            .ok_or(Error::NotFound(id))?;

        let updated = current.patched(patch)?;
        *current = updated.clone();
        self.changelog.append(owner, ChangeEvent::update(updated.clone()));

        tracing::debug!(id = %id, owner = %owner, "record updated");
        Ok(updated)
    }

    async fn delete_by_id(&self, owner: &OwnerId, id: RecordId) -> Result<Record, Error> {
        let mut records = self.records.write();
        match records.get(&id) {
            Some(r) if r.is_owned_by(owner) => {}
            _ => return Err(Error::NotFound(id)),
        }

        let removed = records.remove(&id).ok_or(Error::NotFound(id))?;
        self.changelog.append(owner, ChangeEvent::delete(&removed));

        tracing::debug!(id = %id, owner = %owner, "record deleted");
        Ok(removed)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Record>, Error> {
        let mut owned: Vec<Record> = self
            .records
            .read()
            .values()
            .filter(|r| r.is_owned_by(owner))
            .cloned()
            .collect();
        sort_newest_first(&mut owned);
        Ok(owned)
    }

    async fn get(&self, owner: &OwnerId, id: RecordId) -> Result<Record, Error> {
        self.records
            .read()
            .get(&id)
            .filter(|r| r.is_owned_by(owner))
            .cloned()
            .ok_or(Error::NotFound(id))
    }
}
