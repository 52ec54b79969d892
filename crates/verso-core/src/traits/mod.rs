//! Collaborator traits the versioning core depends on.

mod query;
mod record_store;
mod state_policy;

pub use query::*;
pub use record_store::*;
pub use state_policy::*;
