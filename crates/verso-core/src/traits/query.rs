//! Query facility trait.

use crate::error::VersoResult;
use crate::types::{Record, RecordQuery};

/// Executes [`RecordQuery`] values against a backend.
pub trait QueryFacility: Send + Sync {
    /// Run the query, returning records in the query's order and never more
    /// than its `max_results`.
    fn select(&self, query: &RecordQuery) -> VersoResult<Vec<Record>>;
}
