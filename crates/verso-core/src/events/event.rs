//! Version lifecycle events
//!
//! Published on the [`EventBus`](super::EventBus) after a versioning
//! operation has committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::RecordId;

/// A committed change to a record's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VersionLifecycleEvent {
    /// A snapshot of a record was saved
    SnapshotCreated(SnapshotCreatedEvent),
    /// A record's live content was replaced
    VersionReplaced(VersionReplacedEvent),
    /// Old snapshots of a record were deleted
    VersionsTrimmed(VersionsTrimmedEvent),
}

impl VersionLifecycleEvent {
    /// Dotted name, stable across releases.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SnapshotCreated(_) => "version.snapshot_created",
            Self::VersionReplaced(_) => "version.replaced",
            Self::VersionsTrimmed(_) => "version.trimmed",
        }
    }

    /// Live record whose history changed.
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::SnapshotCreated(e) => e.record_id,
            Self::VersionReplaced(e) => e.record_id,
            Self::VersionsTrimmed(e) => e.record_id,
        }
    }

    /// When the change was published.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SnapshotCreated(e) => e.timestamp,
            Self::VersionReplaced(e) => e.timestamp,
            Self::VersionsTrimmed(e) => e.timestamp,
        }
    }
}

/// A snapshot was saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCreatedEvent {
    /// Random v4 uuid, unique per event.
    pub event_id: String,
    /// Live record the snapshot was taken of
    pub record_id: RecordId,
    /// The snapshot
    pub snapshot_id: RecordId,
    /// Version index captured by the snapshot
    pub version_index: i64,
    pub timestamp: DateTime<Utc>,
}

/// A live record took over another record's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionReplacedEvent {
    /// Random v4 uuid, unique per event.
    pub event_id: String,
    /// Record whose content was replaced
    pub record_id: RecordId,
    /// Record the new content was copied from (if persisted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_id: Option<RecordId>,
    /// Snapshot preserving the previous content (if one was taken)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_version_id: Option<RecordId>,
    pub timestamp: DateTime<Utc>,
}

/// Old snapshots were deleted to honour a retention cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionsTrimmedEvent {
    /// Random v4 uuid, unique per event.
    pub event_id: String,
    /// Master record whose history was trimmed
    pub record_id: RecordId,
    /// Number of snapshots deleted
    pub deleted: usize,
    /// Retention cap that was applied
    pub maximum_number_of_versions: i64,
    pub timestamp: DateTime<Utc>,
}

impl SnapshotCreatedEvent {
    pub fn new(record_id: RecordId, snapshot_id: RecordId, version_index: i64) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            record_id,
            snapshot_id,
            version_index,
            timestamp: Utc::now(),
        }
    }
}

impl VersionReplacedEvent {
    pub fn new(record_id: RecordId) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            record_id,
            replacement_id: None,
            prior_version_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_replacement(mut self, replacement_id: Option<RecordId>) -> Self {
        self.replacement_id = replacement_id;
        self
    }

    pub fn with_prior_version(mut self, prior_version_id: Option<RecordId>) -> Self {
        self.prior_version_id = prior_version_id;
        self
    }
}

impl VersionsTrimmedEvent {
    pub fn new(record_id: RecordId, deleted: usize, maximum_number_of_versions: i64) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            record_id,
            deleted,
            maximum_number_of_versions,
            timestamp: Utc::now(),
        }
    }
}
