//! Bookmark records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Opaque, immutable record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidId(format!("{}: {}", s, e)))
    }
}

/// Identity of the user owning a record.
///
/// This is the subject claim of the session credential, kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Assigned at creation, never changes.
    pub id: RecordId,
    /// Owning user; never changes.
    #[serde(alias = "user_id")]
    pub owner_id: OwnerId,
    /// Free-text label, never empty.
    pub title: String,
    /// Bookmarked URI, never empty. Reachability is not checked.
    #[serde(alias = "url")]
    pub target_uri: String,
    /// Creation time, used only for display ordering.
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Build a new record from a validated draft, stamping id and creation time.
    pub fn create(owner_id: OwnerId, draft: RecordDraft) -> Result<Self, Error> {
        let draft = draft.validate()?;
        Ok(Self {
            id: RecordId::new(),
            owner_id,
            title: draft.title,
            target_uri: draft.target_uri,
            created_at: Utc::now(),
        })
    }

    /// Whether this record belongs to `owner`.
    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        &self.owner_id == owner
    }

    /// Return a copy with the patch applied. Immutable fields are untouched.
    pub fn patched(&self, patch: RecordPatch) -> Result<Self, Error> {
        let patch = patch.validate()?;
        let mut next = self.clone();
        if let Some(title) = patch.title {
            next.title = title;
        }
        if let Some(target_uri) = patch.target_uri {
            next.target_uri = target_uri;
        }
        Ok(next)
    }
}

/// Fields supplied by a user when creating a bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub title: String,
    #[serde(alias = "url")]
    pub target_uri: String,
}

impl RecordDraft {
    pub fn new(title: impl Into<String>, target_uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            target_uri: target_uri.into(),
        }
    }

    /// Trim both fields and reject empty ones.
    pub fn validate(self) -> Result<Self, Error> {
        Ok(Self {
            title: non_empty("title", self.title)?,
            target_uri: non_empty("target_uri", self.target_uri)?,
        })
    }
}

/// A partial update. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub target_uri: Option<String>,
}

impl RecordPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            target_uri: None,
        }
    }

    pub fn with_target_uri(mut self, target_uri: impl Into<String>) -> Self {
        self.target_uri = Some(target_uri.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.target_uri.is_none()
    }

    /// Trim present fields and reject empty ones or an empty patch.
    pub fn validate(self) -> Result<Self, Error> {
        if self.is_empty() {
            return Err(Error::InvalidRecord("patch changes nothing".to_string()));
        }
        Ok(Self {
            title: self.title.map(|t| non_empty("title", t)).transpose()?,
            target_uri: self
                .target_uri
                .map(|u| non_empty("target_uri", u))
                .transpose()?,
        })
    }
}

fn non_empty(field: &str, value: String) -> Result<String, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidRecord(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Order records newest first, breaking timestamp ties by id so the order is total.
pub fn sort_newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
