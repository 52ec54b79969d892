//! verso-core - Versioning of mutable content records.
//!
//! This crate snapshots records before they are modified, atomically
//! replaces a record's live content while keeping its history, lists that
//! history newest first and trims it to a maximum number of versions.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use verso_core::{DefaultStatePolicy, Record, SqliteRecordStore, VersionManager};
//!
//! let store = Arc::new(SqliteRecordStore::in_memory()?);
//! let manager = VersionManager::new(store.clone(), store.clone(), Arc::new(DefaultStatePolicy));
//!
//! let mut page = Record::new("page", "Home");
//! manager.store().save_or_update(&mut page)?;
//!
//! // Keep the old content, then overwrite it
//! let outcome = manager.replace_version(page.clone(), &Record::new("page", "Welcome"))?;
//! let history = manager.get_versions_of(outcome.current(), None)?;
//! manager.trim_version_count_to(outcome.current(), 10)?;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod traits;
pub mod types;
pub mod versioning;

// Re-export commonly used types
pub use config::VersioningConfig;
pub use error::{ErrorCode, VersoError, VersoResult};
pub use events::{EventBus, VersionLifecycleEvent};
pub use store::SqliteRecordStore;
pub use traits::{DefaultStatePolicy, QueryFacility, RecordStore, StatePolicy, Transaction};
pub use types::{
    ContentState, DetailValue, Details, Filter, Record, RecordField, RecordId, RecordQuery,
    PARENT_ID_DETAIL,
};
pub use versioning::{Flow, ReplaceOutcome, ReplacePair, VersionHooks, VersionManager};
