//! Lifecycle states of a content record.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Lifecycle state carried by every record.
///
/// Which state a record should be in is decided by a
/// [`StatePolicy`](crate::traits::StatePolicy); the versioning core only picks
/// the target state for snapshots. States serialize to snake_case for storage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentState {
    /// Created but never saved through the editing workflow.
    #[default]
    New,
    /// Work in progress, not visible to readers.
    Draft,
    /// Scheduled for publishing.
    Waiting,
    /// Visible to readers.
    Published,
    /// Previously published, no longer visible.
    Unpublished,
    /// Moved to the trash.
    Deleted,
}

impl ContentState {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// All state names as static strings.
    pub fn all_names() -> Vec<&'static str> {
        Self::iter().map(|s| s.into()).collect()
    }

    /// State a snapshot of a record in this state is given.
    ///
    /// Snapshots of published content become unpublished; everything else is
    /// kept as a draft.
    pub fn snapshot_state(&self) -> ContentState {
        match self {
            ContentState::Published => ContentState::Unpublished,
            _ => ContentState::Draft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_state_parse() {
        for name in ContentState::all_names() {
            let state = ContentState::from_str(name).unwrap();
            assert_eq!(state.as_str(), name);
        }
        assert!(ContentState::from_str("archived").is_err());
    }

    #[test]
    fn test_snapshot_state() {
        assert_eq!(
            ContentState::Published.snapshot_state(),
            ContentState::Unpublished
        );
        assert_eq!(ContentState::Draft.snapshot_state(), ContentState::Draft);
        assert_eq!(
            ContentState::Unpublished.snapshot_state(),
            ContentState::Draft
        );
        assert_eq!(ContentState::New.snapshot_state(), ContentState::Draft);
    }

    #[test]
    fn test_state_serde_snake_case() {
        let json = serde_json::to_string(&ContentState::Unpublished).unwrap();
        assert_eq!(json, "\"unpublished\"");
    }
}
