//! Record versioning: snapshots before modification, atomic content
//! replacement, history listing and retention trimming.
//!
//! Snapshots are ordinary records with `version_of` pointing at the live
//! record they were copied from. They are detached from the hierarchy and
//! dated slightly in the past so they read as superseded.

mod hooks;
mod manager;

pub use hooks::{Flow, ReplacePair, VersionHooks};
pub use manager::{ReplaceOutcome, VersionManager};
