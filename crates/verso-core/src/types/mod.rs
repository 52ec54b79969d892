//! Core types for verso.

mod details;
mod filter;
mod record;
mod state;

pub use details::*;
pub use filter::*;
pub use record::*;
pub use state::ContentState;
