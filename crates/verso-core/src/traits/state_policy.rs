//! Lifecycle state assignment.

use chrono::Utc;

use crate::error::VersoResult;
use crate::types::{ContentState, Record};

/// Assigns lifecycle states to records.
///
/// The versioning core decides which state a snapshot should be in and asks
/// the policy to apply it; how the transition is carried out is up to the
/// implementation.
#[cfg_attr(test, mockall::automock)]
pub trait StatePolicy: Send + Sync {
    /// Move `record` into `state`.
    fn change_to(&self, record: &mut Record, state: ContentState) -> VersoResult<()>;
}

/// Sets the state directly, stamping the publish date when publishing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStatePolicy;

impl StatePolicy for DefaultStatePolicy {
    fn change_to(&self, record: &mut Record, state: ContentState) -> VersoResult<()> {
        if state == ContentState::Published && record.published.is_none() {
            record.published = Some(Utc::now());
        }
        tracing::trace!(from = %record.state, to = %state, "Changing record state");
        record.state = state;
        Ok(())
    }
}
