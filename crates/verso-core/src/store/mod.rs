//! Bundled record store backends.

mod sqlite;

pub use sqlite::{SqlTranslator, SqliteRecordStore};
