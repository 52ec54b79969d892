//! Version manager: snapshots, replacement, history and retention.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::VersioningConfig;
use crate::error::{VersoError, VersoResult};
use crate::events::{
    EventBus, SnapshotCreatedEvent, VersionLifecycleEvent, VersionReplacedEvent,
    VersionsTrimmedEvent,
};
use crate::store::SqliteRecordStore;
use crate::traits::{DefaultStatePolicy, QueryFacility, RecordStore, StatePolicy};
use crate::types::{Record, RecordQuery, PARENT_ID_DETAIL};
use crate::versioning::{Flow, ReplacePair, VersionHooks};

/// Result of [`VersionManager::replace_version_with`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReplaceOutcome {
    /// The previous content was saved as `prior_version`, then replaced.
    Preserved {
        prior_version: Record,
        current: Record,
    },
    /// The content was replaced without a snapshot, either because none was
    /// requested or because a before-save hook cancelled it.
    Replaced(Record),
    /// A before-replace hook cancelled; nothing was written.
    Cancelled(Record),
}

impl ReplaceOutcome {
    /// The current record, after replacement or untouched when cancelled.
    pub fn current(&self) -> &Record {
        match self {
            Self::Preserved { current, .. } => current,
            Self::Replaced(current) | Self::Cancelled(current) => current,
        }
    }

    /// Snapshot of the previous content, if one was saved.
    pub fn prior_version(&self) -> Option<&Record> {
        match self {
            Self::Preserved { prior_version, .. } => Some(prior_version),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The prior version when one was saved, otherwise the current record.
    pub fn into_record(self) -> Record {
        match self {
            Self::Preserved { prior_version, .. } => prior_version,
            Self::Replaced(current) | Self::Cancelled(current) => current,
        }
    }
}

/// Creates, replaces, lists and trims versions of content records.
///
/// Persistence goes through the [`RecordStore`], history lookups through the
/// [`QueryFacility`] and snapshot states through the [`StatePolicy`]. Every
/// operation runs to completion on the caller's thread.
pub struct VersionManager {
    store: Arc<dyn RecordStore>,
    query: Arc<dyn QueryFacility>,
    state_policy: Arc<dyn StatePolicy>,
    hooks: VersionHooks,
    events: Option<EventBus>,
    config: VersioningConfig,
}

impl VersionManager {
    /// Create a manager with default configuration and no subscribers.
    pub fn new(
        store: Arc<dyn RecordStore>,
        query: Arc<dyn QueryFacility>,
        state_policy: Arc<dyn StatePolicy>,
    ) -> Self {
        Self {
            store,
            query,
            state_policy,
            hooks: VersionHooks::new(),
            events: None,
            config: VersioningConfig::default(),
        }
    }

    /// Open the SQLite store named by `config` and wire the default policy
    /// and an event bus around it.
    pub fn from_config(config: &VersioningConfig) -> VersoResult<Self> {
        config.validate()?;
        let store = Arc::new(SqliteRecordStore::new(&config.database_path)?);
        info!(path = %config.database_path.display(), "Opened record store");

        Ok(Self::new(store.clone(), store, Arc::new(DefaultStatePolicy))
            .with_config(config.clone())
            .with_event_bus(EventBus::with_capacity(config.event_capacity)))
    }

    /// Set configuration.
    pub fn with_config(mut self, config: VersioningConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish lifecycle events on `bus` once operations complete.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Subscribers for before/after notifications.
    pub fn hooks_mut(&mut self) -> &mut VersionHooks {
        &mut self.hooks
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn events(&self) -> Option<&EventBus> {
        self.events.as_ref()
    }

    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    /// Whether `record` takes part in versioning: snapshots and records of a
    /// kind listed in `non_versionable_kinds` do not.
    pub fn is_versionable(&self, record: &Record) -> bool {
        !record.is_snapshot()
            && !self
                .config
                .non_versionable_kinds
                .iter()
                .any(|kind| kind == &record.kind)
    }

    /// Save a snapshot of `record`'s current content and return it.
    ///
    /// Call this before modifying the live record. Returns `Ok(None)` when a
    /// before-save hook cancels, in which case nothing is written. An error
    /// from any step, after-save hooks included, leaves no snapshot behind.
    pub fn save_version(&self, record: &Record) -> VersoResult<Option<Record>> {
        let tx = self.store.begin_transaction()?;
        let snapshot = self.snapshot(record)?;
        tx.commit()?;
        if let Some(snapshot) = &snapshot {
            self.publish_snapshot_created(snapshot);
        }
        Ok(snapshot)
    }

    fn snapshot(&self, record: &Record) -> VersoResult<Option<Record>> {
        let source = match self.hooks.before_save(record.clone())? {
            Flow::Proceed(source) => source,
            Flow::Cancel(source) => {
                debug!(record_id = ?source.id, "Snapshot cancelled by subscriber");
                return Ok(None);
            }
        };
        let source_id = source
            .id
            .ok_or_else(|| VersoError::transient_record("save_version"))?;

        let mut snapshot = source.snapshot_copy();
        self.state_policy
            .change_to(&mut snapshot, source.state.snapshot_state())?;

        let stale = Utc::now() - self.config.snapshot_offset();
        snapshot.expires = Some(stale);
        snapshot.updated = stale;

        snapshot.parent = None;
        if let Some(parent) = source.parent {
            snapshot.details.set(PARENT_ID_DETAIL, parent);
        }
        snapshot.version_of = Some(source_id);

        self.store.save_or_update(&mut snapshot)?;
        self.hooks.after_save(&snapshot)?;

        debug!(
            record_id = %source_id,
            snapshot_id = ?snapshot.id,
            version_index = snapshot.version_index,
            "Saved version"
        );
        Ok(Some(snapshot))
    }

    /// Replace `current`'s content with `replacement`'s, saving the previous
    /// content as a snapshot first.
    pub fn replace_version(
        &self,
        current: Record,
        replacement: &Record,
    ) -> VersoResult<ReplaceOutcome> {
        self.replace_version_with(current, replacement, true)
    }

    /// Replace `current`'s content with `replacement`'s inside one
    /// transaction, optionally saving the previous content first.
    ///
    /// `replacement` is only read. Any error rolls back both the snapshot and
    /// the overwrite.
    pub fn replace_version_with(
        &self,
        current: Record,
        replacement: &Record,
        store_current: bool,
    ) -> VersoResult<ReplaceOutcome> {
        let pair = ReplacePair {
            current,
            replacement: replacement.clone(),
        };
        let ReplacePair {
            mut current,
            replacement,
        } = match self.hooks.before_replace(pair)? {
            Flow::Proceed(pair) => pair,
            Flow::Cancel(pair) => {
                debug!(record_id = ?pair.current.id, "Replace cancelled by subscriber");
                return Ok(ReplaceOutcome::Cancelled(pair.current));
            }
        };
        let current_id = current
            .id
            .ok_or_else(|| VersoError::transient_record("replace_version"))?;

        let tx = self.store.begin_transaction()?;
        let prior_version = if store_current {
            self.snapshot(&current)?
        } else {
            None
        };
        self.replace(&mut current, &replacement, prior_version.as_ref())?;
        tx.commit()?;

        info!(
            record_id = %current_id,
            replacement_id = ?replacement.id,
            prior_version_id = ?prior_version.as_ref().and_then(|p| p.id),
            "Replaced version"
        );

        if let Some(prior) = &prior_version {
            self.publish_snapshot_created(prior);
        }
        self.publish(VersionLifecycleEvent::VersionReplaced(
            VersionReplacedEvent::new(current_id)
                .with_replacement(replacement.id)
                .with_prior_version(prior_version.as_ref().and_then(|p| p.id)),
        ));

        Ok(match prior_version {
            Some(prior_version) => ReplaceOutcome::Preserved {
                prior_version,
                current,
            },
            None => ReplaceOutcome::Replaced(current),
        })
    }

    /// Overwrite step of a replace; must run inside a transaction.
    fn replace(
        &self,
        current: &mut Record,
        replacement: &Record,
        prior_version: Option<&Record>,
    ) -> VersoResult<()> {
        let newest = prior_version
            .map(|p| p.version_index)
            .into_iter()
            .chain([current.version_index, replacement.version_index])
            .max()
            .unwrap_or(current.version_index);

        current.details.clear();
        current.update_from(replacement);
        current.updated = Utc::now();
        current.version_index = newest + 1;

        self.store.update(current)?;
        self.hooks.after_replace(replacement)?;
        self.store.flush()
    }

    /// History of `record`, the record itself included, newest first.
    ///
    /// `max` bounds the number of entries without changing their order.
    pub fn get_versions_of(&self, record: &Record, max: Option<usize>) -> VersoResult<Vec<Record>> {
        let Some(id) = record.id else {
            return Ok(Vec::new());
        };
        self.query
            .select(&RecordQuery::versions_of(id).max_results(max))
    }

    /// Entry of `record`'s history with the given version index.
    pub fn get_version(&self, record: &Record, version_index: i64) -> VersoResult<Option<Record>> {
        Ok(self
            .get_versions_of(record, None)?
            .into_iter()
            .find(|r| r.version_index == version_index))
    }

    /// Delete the oldest snapshots of `record` so that at most
    /// `maximum_number_of_versions` records remain, the live one included.
    ///
    /// 0 disables trimming. Negative values are rejected. Returns the number
    /// of snapshots deleted.
    pub fn trim_version_count_to(
        &self,
        record: &Record,
        maximum_number_of_versions: i64,
    ) -> VersoResult<usize> {
        if maximum_number_of_versions < 0 {
            return Err(VersoError::negative_retention(maximum_number_of_versions));
        }
        if maximum_number_of_versions == 0 {
            return Ok(0);
        }
        let Some(id) = record.id else {
            return Ok(0);
        };

        let mut snapshots = self.get_versions_of(record, None)?;
        snapshots.retain(|r| r.id != Some(id));

        let max = usize::try_from(maximum_number_of_versions - 1).unwrap_or(usize::MAX);
        if snapshots.len() <= max {
            return Ok(0);
        }

        let tx = self.store.begin_transaction()?;
        for snapshot in &snapshots[max..] {
            self.store.delete(snapshot)?;
        }
        self.store.flush()?;
        tx.commit()?;

        let deleted = snapshots.len() - max;
        info!(
            record_id = %id,
            deleted,
            maximum_number_of_versions,
            "Trimmed versions"
        );
        self.publish(VersionLifecycleEvent::VersionsTrimmed(
            VersionsTrimmedEvent::new(id, deleted, maximum_number_of_versions),
        ));
        Ok(deleted)
    }

    /// Trim `record`'s history to the configured `max_versions`.
    pub fn trim_to_configured(&self, record: &Record) -> VersoResult<usize> {
        self.trim_version_count_to(record, self.config.max_versions)
    }

    fn publish_snapshot_created(&self, snapshot: &Record) {
        if let (Some(record_id), Some(snapshot_id)) = (snapshot.version_of, snapshot.id) {
            self.publish(VersionLifecycleEvent::SnapshotCreated(
                SnapshotCreatedEvent::new(record_id, snapshot_id, snapshot.version_index),
            ));
        }
    }

    fn publish(&self, event: VersionLifecycleEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}
