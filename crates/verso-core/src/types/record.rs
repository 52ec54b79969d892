//! Versionable content records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::details::{Details, PARENT_ID_DETAIL};
use super::state::ContentState;

/// Stable identity of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A content record.
///
/// A record with `version_of == None` is live; any other record is a
/// snapshot of the live record it points to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identity. `None` until the record is first saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Content type discriminator.
    pub kind: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Lifecycle state.
    pub state: ContentState,
    /// Master record this is a snapshot of.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_of: Option<RecordId>,
    /// History ordinal, higher is newer.
    pub version_index: i64,
    /// Position in the containment hierarchy. Always `None` on snapshots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<RecordId>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    pub sort_order: i32,
    pub visible: bool,
    #[serde(default)]
    pub details: Details,
}

impl Record {
    /// Create a new transient record.
    pub fn new(kind: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            kind: kind.into(),
            title: title.into(),
            name: None,
            state: ContentState::New,
            version_of: None,
            version_index: 0,
            parent: None,
            created: now,
            updated: now,
            published: None,
            expires: None,
            sort_order: 0,
            visible: true,
            details: Details::new(),
        }
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the lifecycle state.
    pub fn with_state(mut self, state: ContentState) -> Self {
        self.state = state;
        self
    }

    /// Set the parent.
    pub fn with_parent(mut self, parent: RecordId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the version index.
    pub fn with_version_index(mut self, index: i64) -> Self {
        self.version_index = index;
        self
    }

    /// Set an attribute.
    pub fn with_detail(
        mut self,
        key: impl Into<String>,
        value: impl Into<super::DetailValue>,
    ) -> Self {
        self.details.set(key, value);
        self
    }

    /// Whether this record is a snapshot rather than the live record.
    pub fn is_snapshot(&self) -> bool {
        self.version_of.is_some()
    }

    /// Whether this record has never been saved.
    pub fn is_transient(&self) -> bool {
        self.id.is_none()
    }

    /// Id of the parent a snapshot was detached from, if any.
    pub fn former_parent(&self) -> Option<RecordId> {
        self.details.get(PARENT_ID_DETAIL).and_then(|v| v.as_link())
    }

    /// Copy of this record to become a snapshot.
    ///
    /// Copied: kind, title, name, state, version index, timestamps, sort
    /// order, visibility and every detail and collection.
    /// Reset: id (the copy is a new record), `version_of` and `parent`.
    /// Children are never part of a record, so nothing below it is copied.
    pub fn snapshot_copy(&self) -> Record {
        Record {
            id: None,
            kind: self.kind.clone(),
            title: self.title.clone(),
            name: self.name.clone(),
            state: self.state,
            version_of: None,
            version_index: self.version_index,
            parent: None,
            created: self.created,
            updated: self.updated,
            published: self.published,
            expires: self.expires,
            sort_order: self.sort_order,
            visible: self.visible,
            details: self.details.clone(),
        }
    }

    /// Overwrite this record's content with `other`'s.
    ///
    /// All attributes and collections are cleared first, then everything is
    /// copied from `other` except `id`, `version_of`, `parent`,
    /// `version_index` and the former-parent attribute, which keep this
    /// record's values.
    pub fn update_from(&mut self, other: &Record) {
        self.details.clear();

        self.kind = other.kind.clone();
        self.title = other.title.clone();
        self.name = other.name.clone();
        self.state = other.state;
        self.created = other.created;
        self.updated = other.updated;
        self.published = other.published;
        self.expires = other.expires;
        self.sort_order = other.sort_order;
        self.visible = other.visible;
        self.details.copy_from_except(&other.details, &[PARENT_ID_DETAIL]);
    }

    /// Whether two records hold the same content, ignoring identity fields
    /// and timestamps that versioning rewrites.
    pub fn same_content(&self, other: &Record) -> bool {
        self.kind == other.kind
            && self.title == other.title
            && self.name == other.name
            && self.sort_order == other.sort_order
            && self.visible == other.visible
            && self.details == other.details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut record = Record::new("page", "Home")
            .with_name("home")
            .with_state(ContentState::Published)
            .with_parent(RecordId(1))
            .with_version_index(4)
            .with_detail("Text", "hello");
        record.id = Some(RecordId(10));
        record.details.collection_mut("Tags").push("a".into());
        record
    }

    #[test]
    fn test_new_record_is_transient() {
        let record = Record::new("page", "Home");
        assert!(record.is_transient());
        assert!(!record.is_snapshot());
        assert_eq!(record.state, ContentState::New);
        assert!(record.visible);
    }

    #[test]
    fn test_snapshot_copy_policy() {
        let source = sample();
        let copy = source.snapshot_copy();

        assert!(copy.id.is_none());
        assert!(copy.parent.is_none());
        assert!(copy.version_of.is_none());
        assert_eq!(copy.version_index, 4);
        assert_eq!(copy.state, ContentState::Published);
        assert!(copy.same_content(&source));
        assert_eq!(copy.details.collection("Tags").map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_update_from_preserves_identity() {
        let mut current = sample();
        let mut other = Record::new("article", "News")
            .with_version_index(1)
            .with_detail("Body", "text")
            .with_detail(PARENT_ID_DETAIL, RecordId(99));
        other.id = Some(RecordId(55));
        other.version_of = Some(RecordId(10));

        current.update_from(&other);

        assert_eq!(current.id, Some(RecordId(10)));
        assert_eq!(current.parent, Some(RecordId(1)));
        assert!(current.version_of.is_none());
        assert_eq!(current.version_index, 4);
        assert_eq!(current.kind, "article");
        assert_eq!(current.title, "News");
        assert!(current.name.is_none());
        assert!(!current.details.contains("Text"));
        assert!(current.details.collection("Tags").is_none());
        assert_eq!(current.details.get("Body").and_then(|v| v.as_text()), Some("text"));
        assert!(current.former_parent().is_none());
    }

    #[test]
    fn test_former_parent() {
        let record = Record::new("page", "Old").with_detail(PARENT_ID_DETAIL, RecordId(3));
        assert_eq!(record.former_parent(), Some(RecordId(3)));
    }
}
