//! Record store trait and transaction scope.

use crate::error::VersoResult;
use crate::types::{Record, RecordId};

/// A transaction scope acquired from a [`RecordStore`].
///
/// Dropping a transaction that was neither committed nor rolled back rolls it
/// back, so every early return leaves no partial write behind.
pub trait Transaction {
    /// Make every write performed since `begin_transaction` durable.
    fn commit(self: Box<Self>) -> VersoResult<()>;

    /// Discard every write performed since `begin_transaction`.
    fn rollback(self: Box<Self>) -> VersoResult<()>;
}

/// Core RecordStore trait - persistence backends implement this.
///
/// Calls made while a transaction is open belong to that transaction.
/// Transactions nest: an inner commit only becomes durable with the
/// outermost one.
pub trait RecordStore: Send + Sync {
    /// Insert a transient record (assigning its id) or update a persisted one.
    fn save_or_update(&self, record: &mut Record) -> VersoResult<()>;

    /// Update an existing record.
    fn update(&self, record: &Record) -> VersoResult<()>;

    /// Delete a record.
    fn delete(&self, record: &Record) -> VersoResult<()>;

    /// Load a record by id.
    fn get(&self, id: RecordId) -> VersoResult<Option<Record>>;

    /// Push pending writes down to the storage engine.
    fn flush(&self) -> VersoResult<()>;

    /// Open a transaction scope.
    fn begin_transaction(&self) -> VersoResult<Box<dyn Transaction + '_>>;
}
