//! SQLite-backed record store.
//!
//! Records live in a single `records` table; details and collections are
//! stored as a JSON document. Transactions are SQLite savepoints, so they nest
//! and an inner scope can be rolled back without touching the outer one.
//!
//! All callers share one connection. While a thread has a transaction open it
//! owns that connection: statements and transactions from other threads wait
//! until its outermost scope commits or rolls back.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::ops::Deref;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use crate::error::{VersoError, VersoResult};
use crate::traits::{QueryFacility, RecordStore, Transaction};
use crate::types::{
    ContentState, Details, FieldValue, Filter, FilterOperator, FilterTranslator, OrderBy, Record,
    RecordId, RecordQuery, SortDirection,
};

const RECORD_COLUMNS: &str = "id, kind, title, name, state, version_of, version_index, parent_id, \
     created, updated, published, expires, sort_order, visible, details";

/// SQLite-backed record store
pub struct SqliteRecordStore {
    state: Mutex<ConnectionState>,
    released: Condvar,
}

/// The shared connection and the thread whose transaction currently owns it.
struct ConnectionState {
    conn: Connection,
    owner: Option<ThreadId>,
    depth: usize,
}

/// Locked connection, handed out only to the owning thread.
struct ConnectionGuard<'a>(MutexGuard<'a, ConnectionState>);

impl Deref for ConnectionGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.0.conn
    }
}

impl SqliteRecordStore {
    /// Open (or create) a store at the given path. `":memory:"` opens an
    /// in-memory database.
    pub fn new(path: impl AsRef<Path>) -> VersoResult<Self> {
        let path = path.as_ref();
        if path.to_str() == Some(":memory:") {
            return Self::in_memory();
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> VersoResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> VersoResult<Self> {
        let store = Self {
            state: Mutex::new(ConnectionState {
                conn,
                owner: None,
                depth: 0,
            }),
            released: Condvar::new(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Lock the connection, waiting while another thread's transaction is open.
    fn lock_state(&self) -> VersoResult<MutexGuard<'_, ConnectionState>> {
        let me = thread::current().id();
        let state = self.state.lock().map_err(|_| poisoned())?;
        self.released
            .wait_while(state, |s| s.owner.is_some_and(|owner| owner != me))
            .map_err(|_| poisoned())
    }

    fn conn(&self) -> VersoResult<ConnectionGuard<'_>> {
        self.lock_state().map(ConnectionGuard)
    }

    fn init_schema(&self) -> VersoResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                name TEXT,
                state TEXT NOT NULL,
                version_of INTEGER,
                version_index INTEGER NOT NULL DEFAULT 0,
                parent_id INTEGER,
                created TEXT NOT NULL,
                updated TEXT NOT NULL,
                published TEXT,
                expires TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                visible INTEGER NOT NULL DEFAULT 1,
                details TEXT NOT NULL
            );

            -- History lookups
            CREATE INDEX IF NOT EXISTS idx_records_version_of
                ON records(version_of, version_index DESC);

            CREATE INDEX IF NOT EXISTS idx_records_parent
                ON records(parent_id);
        "#,
        )?;
        tracing::debug!("Record store schema ready");
        Ok(())
    }

    /// Count all records, live and snapshots.
    pub fn count_all(&self) -> VersoResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn format_time(time: &DateTime<Utc>) -> String {
        time.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_time(data: &str) -> VersoResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(data)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| VersoError::parse(e.to_string()))
    }

    fn parse_optional_time(data: Option<String>) -> VersoResult<Option<DateTime<Utc>>> {
        data.as_deref().map(Self::parse_time).transpose()
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> VersoResult<Record> {
        let id: i64 = row.get(0)?;
        let state: String = row.get(4)?;
        let version_of: Option<i64> = row.get(5)?;
        let parent: Option<i64> = row.get(7)?;
        let created: String = row.get(8)?;
        let updated: String = row.get(9)?;
        let details: String = row.get(14)?;

        Ok(Record {
            id: Some(RecordId(id)),
            kind: row.get(1)?,
            title: row.get(2)?,
            name: row.get(3)?,
            state: ContentState::from_str(&state)
                .map_err(|e| VersoError::parse(format!("state '{}': {}", state, e)))?,
            version_of: version_of.map(RecordId),
            version_index: row.get(6)?,
            parent: parent.map(RecordId),
            created: Self::parse_time(&created)?,
            updated: Self::parse_time(&updated)?,
            published: Self::parse_optional_time(row.get(10)?)?,
            expires: Self::parse_optional_time(row.get(11)?)?,
            sort_order: row.get(12)?,
            visible: row.get::<_, i32>(13)? != 0,
            details: serde_json::from_str::<Details>(&details)?,
        })
    }

    fn insert(&self, record: &mut Record) -> VersoResult<()> {
        let details = serde_json::to_string(&record.details)?;
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO records
               (kind, title, name, state, version_of, version_index, parent_id,
                created, updated, published, expires, sort_order, visible, details)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            params![
                record.kind,
                record.title,
                record.name,
                record.state.as_str(),
                record.version_of.map(|id| id.0),
                record.version_index,
                record.parent.map(|id| id.0),
                Self::format_time(&record.created),
                Self::format_time(&record.updated),
                record.published.as_ref().map(Self::format_time),
                record.expires.as_ref().map(Self::format_time),
                record.sort_order,
                record.visible as i32,
                details,
            ],
        )?;
        let id = RecordId(conn.last_insert_rowid());
        record.id = Some(id);
        tracing::debug!(record_id = %id, kind = %record.kind, "Inserted record");
        Ok(())
    }

    /// Close the transaction scope named `savepoint`, then hand the
    /// connection back to other threads once the outermost scope is closed.
    fn end_transaction(&self, savepoint: &str, commit: bool) -> VersoResult<()> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        let sql = if commit {
            format!("RELEASE SAVEPOINT {}", savepoint)
        } else {
            format!("ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}", savepoint)
        };
        let result = state.conn.execute_batch(&sql);

        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_all();
        }
        result.map_err(VersoError::from)
    }
}

fn poisoned() -> VersoError {
    VersoError::internal("record store connection lock poisoned")
}

impl RecordStore for SqliteRecordStore {
    fn save_or_update(&self, record: &mut Record) -> VersoResult<()> {
        if record.id.is_none() {
            self.insert(record)
        } else {
            self.update(record)
        }
    }

    fn update(&self, record: &Record) -> VersoResult<()> {
        let id = record
            .id
            .ok_or_else(|| VersoError::transient_record("update"))?;
        let details = serde_json::to_string(&record.details)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"UPDATE records SET
                   kind = ?2, title = ?3, name = ?4, state = ?5, version_of = ?6,
                   version_index = ?7, parent_id = ?8, created = ?9, updated = ?10,
                   published = ?11, expires = ?12, sort_order = ?13, visible = ?14,
                   details = ?15
               WHERE id = ?1"#,
            params![
                id.0,
                record.kind,
                record.title,
                record.name,
                record.state.as_str(),
                record.version_of.map(|v| v.0),
                record.version_index,
                record.parent.map(|p| p.0),
                Self::format_time(&record.created),
                Self::format_time(&record.updated),
                record.published.as_ref().map(Self::format_time),
                record.expires.as_ref().map(Self::format_time),
                record.sort_order,
                record.visible as i32,
                details,
            ],
        )?;
        if changed == 0 {
            return Err(VersoError::not_found(id));
        }
        tracing::debug!(record_id = %id, "Updated record");
        Ok(())
    }

    fn delete(&self, record: &Record) -> VersoResult<()> {
        let id = record
            .id
            .ok_or_else(|| VersoError::transient_record("delete"))?;
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM records WHERE id = ?1", params![id.0])?;
        if changed == 0 {
            return Err(VersoError::not_found(id));
        }
        tracing::debug!(record_id = %id, "Deleted record");
        Ok(())
    }

    fn get(&self, id: RecordId) -> VersoResult<Option<Record>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM records WHERE id = ?1",
            RECORD_COLUMNS
        ))?;

        stmt.query_row(params![id.0], |row| Ok(Self::row_to_record(row)))
            .optional()?
            .transpose()
    }

    fn flush(&self) -> VersoResult<()> {
        self.conn()?.cache_flush()?;
        Ok(())
    }

    fn begin_transaction(&self) -> VersoResult<Box<dyn Transaction + '_>> {
        let mut state = self.lock_state()?;
        let savepoint = format!("verso_sp_{}", state.depth);
        state
            .conn
            .execute_batch(&format!("SAVEPOINT {}", savepoint))?;
        state.owner = Some(thread::current().id());
        state.depth += 1;
        drop(state);
        tracing::trace!(savepoint = %savepoint, "Opened transaction");
        Ok(Box::new(SqliteTransaction {
            store: self,
            savepoint,
            finished: false,
        }))
    }
}

impl QueryFacility for SqliteRecordStore {
    fn select(&self, query: &RecordQuery) -> VersoResult<Vec<Record>> {
        let mut sql = format!("SELECT {} FROM records", RECORD_COLUMNS);
        let mut values = Vec::new();

        if let Some(filter) = &query.filter {
            let (clause, params) = SqlTranslator.translate(filter)?;
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            values = params;
        }

        if !query.order.is_empty() {
            let terms: Vec<String> = query.order.iter().map(order_term).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(max) = query.max_results {
            sql.push_str(&format!(" LIMIT {}", max));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let results = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(Self::row_to_record(row))
        })?;

        results
            .map(|r| r.map_err(VersoError::from).and_then(|inner| inner))
            .collect()
    }
}

fn order_term(order: &OrderBy) -> String {
    match order {
        OrderBy::Field { field, direction } => {
            let dir = match direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{} {}", field.column(), dir)
        }
        OrderBy::LiveFirst => "(version_of IS NULL) DESC".to_string(),
    }
}

/// Translates filters into a SQL `WHERE` clause with positional parameters.
pub struct SqlTranslator;

impl SqlTranslator {
    fn value(value: &FieldValue) -> Value {
        match value {
            FieldValue::Id(id) => Value::Integer(id.0),
            FieldValue::Int(i) => Value::Integer(*i),
            FieldValue::Text(s) => Value::Text(s.clone()),
            FieldValue::State(state) => Value::Text(state.as_str().to_string()),
            FieldValue::DateTime(time) => Value::Text(SqliteRecordStore::format_time(time)),
        }
    }

    fn join(&self, filters: &[Filter], op: &str, empty: &str) -> VersoResult<(String, Vec<Value>)> {
        if filters.is_empty() {
            return Ok((empty.to_string(), Vec::new()));
        }
        let mut clauses = Vec::with_capacity(filters.len());
        let mut values = Vec::new();
        for filter in filters {
            let (clause, params) = self.translate(filter)?;
            clauses.push(format!("({})", clause));
            values.extend(params);
        }
        Ok((clauses.join(op), values))
    }
}

impl FilterTranslator for SqlTranslator {
    type Output = (String, Vec<Value>);
    type Error = VersoError;

    fn translate(&self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        match filter {
            Filter::Condition(condition) => {
                let column = condition.field.column();
                Ok(match &condition.operator {
                    FilterOperator::Eq(v) => (format!("{} = ?", column), vec![Self::value(v)]),
                    FilterOperator::Ne(v) => (format!("{} != ?", column), vec![Self::value(v)]),
                    FilterOperator::IsNull => (format!("{} IS NULL", column), Vec::new()),
                    FilterOperator::IsNotNull => (format!("{} IS NOT NULL", column), Vec::new()),
                })
            }
            Filter::And(filters) => self.join(filters, " AND ", "1 = 1"),
            Filter::Or(filters) => self.join(filters, " OR ", "1 = 0"),
            Filter::Not(inner) => {
                let (clause, values) = self.translate(inner)?;
                Ok((format!("NOT ({})", clause), values))
            }
        }
    }
}

/// Savepoint-backed transaction scope.
struct SqliteTransaction<'a> {
    store: &'a SqliteRecordStore,
    savepoint: String,
    finished: bool,
}

impl Transaction for SqliteTransaction<'_> {
    fn commit(mut self: Box<Self>) -> VersoResult<()> {
        self.finished = true;
        self.store.end_transaction(&self.savepoint, true)?;
        tracing::trace!(savepoint = %self.savepoint, "Committed transaction");
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> VersoResult<()> {
        self.finished = true;
        self.store.end_transaction(&self.savepoint, false)
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.store.end_transaction(&self.savepoint, false) {
            Ok(()) => tracing::debug!(savepoint = %self.savepoint, "Rolled back transaction"),
            Err(e) => tracing::warn!(
                savepoint = %self.savepoint,
                "Failed to roll back transaction: {}",
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordField, PARENT_ID_DETAIL};
    use std::sync::mpsc;
    use std::time::Duration;

    fn saved(store: &SqliteRecordStore, title: &str) -> Record {
        let mut record = Record::new("page", title);
        store.save_or_update(&mut record).unwrap();
        record
    }

    #[test]
    fn test_record_store_crud() {
        let store = SqliteRecordStore::in_memory().unwrap();

        let mut record = Record::new("page", "Home")
            .with_name("home")
            .with_state(ContentState::Published)
            .with_parent(RecordId(77))
            .with_detail("Text", "hello")
            .with_detail(PARENT_ID_DETAIL, RecordId(5));
        record.details.collection_mut("Tags").push("a".into());
        record.expires = Some(Utc::now());

        store.save_or_update(&mut record).unwrap();
        let id = record.id.unwrap();

        let loaded = store.get(id).unwrap().unwrap();
        assert_eq!(loaded, record_with_store_precision(&record));

        record.title = "Start".to_string();
        store.update(&record).unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().title, "Start");

        store.delete(&record).unwrap();
        assert!(store.get(id).unwrap().is_none());
        assert_eq!(store.count_all().unwrap(), 0);
    }

    fn record_with_store_precision(record: &Record) -> Record {
        let reparse = |t: &DateTime<Utc>| {
            SqliteRecordStore::parse_time(&SqliteRecordStore::format_time(t)).unwrap()
        };
        let mut expected = record.clone();
        expected.created = reparse(&record.created);
        expected.updated = reparse(&record.updated);
        expected.published = record.published.as_ref().map(reparse);
        expected.expires = record.expires.as_ref().map(reparse);
        expected
    }

    #[test]
    fn test_update_missing_record() {
        let store = SqliteRecordStore::in_memory().unwrap();

        let transient = Record::new("page", "Nope");
        let err = store.update(&transient).unwrap_err();
        assert!(err.is_invalid_argument());

        let mut ghost = Record::new("page", "Ghost");
        ghost.id = Some(RecordId(999));
        let err = store.update(&ghost).unwrap_err();
        assert!(matches!(err, VersoError::NotFound { .. }));
    }

    #[test]
    fn test_transaction_commit() {
        let store = SqliteRecordStore::in_memory().unwrap();

        let tx = store.begin_transaction().unwrap();
        saved(&store, "A");
        tx.commit().unwrap();

        assert_eq!(store.count_all().unwrap(), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_drop() {
        let store = SqliteRecordStore::in_memory().unwrap();
        saved(&store, "Kept");

        {
            let _tx = store.begin_transaction().unwrap();
            saved(&store, "Discarded");
            assert_eq!(store.count_all().unwrap(), 2);
        }

        assert_eq!(store.count_all().unwrap(), 1);
    }

    #[test]
    fn test_explicit_rollback() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let tx = store.begin_transaction().unwrap();
        saved(&store, "Discarded");
        tx.rollback().unwrap();
        assert_eq!(store.count_all().unwrap(), 0);

        // The store is usable again after a rollback
        let tx = store.begin_transaction().unwrap();
        saved(&store, "Kept");
        tx.commit().unwrap();
        assert_eq!(store.count_all().unwrap(), 1);
    }

    #[test]
    fn test_nested_transactions() {
        let store = SqliteRecordStore::in_memory().unwrap();

        let outer = store.begin_transaction().unwrap();
        saved(&store, "Outer");
        {
            let inner = store.begin_transaction().unwrap();
            saved(&store, "Inner");
            inner.commit().unwrap();
        }
        {
            let _inner = store.begin_transaction().unwrap();
            saved(&store, "Rolled back");
        }
        assert_eq!(store.count_all().unwrap(), 2);
        drop(outer);

        assert_eq!(store.count_all().unwrap(), 0);
    }

    #[test]
    fn test_transactions_isolated_between_threads() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let (opened, wait_opened) = mpsc::channel();

        thread::scope(|s| {
            let store = &store;
            let first = s.spawn(move || {
                let tx = store.begin_transaction().unwrap();
                saved(store, "A");
                opened.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                tx.commit().unwrap();
            });

            wait_opened.recv().unwrap();
            let second = s.spawn(move || {
                // Waits for the first transaction to finish
                let _tx = store.begin_transaction().unwrap();
                saved(store, "B");
            });

            first.join().unwrap();
            second.join().unwrap();
        });

        let titles: Vec<String> = store
            .select(&RecordQuery::all())
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["A".to_string()]);
    }

    #[test]
    fn test_plain_writes_wait_for_foreign_transaction() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let (opened, wait_opened) = mpsc::channel();

        thread::scope(|s| {
            let store = &store;
            let first = s.spawn(move || {
                let tx = store.begin_transaction().unwrap();
                saved(store, "Discarded");
                opened.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                tx.rollback().unwrap();
            });

            wait_opened.recv().unwrap();
            let second = s.spawn(move || {
                saved(store, "Kept");
            });

            first.join().unwrap();
            second.join().unwrap();
        });

        let all = store.select(&RecordQuery::all()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Kept");
    }

    #[test]
    fn test_select_versions_of_ordering() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let master = saved(&store, "Master");
        let master_id = master.id.unwrap();

        for index in [2, 0, 1] {
            let mut snapshot = Record::new("page", format!("v{}", index)).with_version_index(index);
            snapshot.version_of = Some(master_id);
            store.save_or_update(&mut snapshot).unwrap();
        }
        saved(&store, "Unrelated");

        let history = store.select(&RecordQuery::versions_of(master_id)).unwrap();
        let titles: Vec<&str> = history.iter().map(|r| r.title.as_str()).collect();
        // master has index 0 and ties with "v0"; live records come first
        assert_eq!(titles, vec!["v2", "v1", "Master", "v0"]);

        let bounded = store
            .select(&RecordQuery::versions_of(master_id).max_results(Some(2)))
            .unwrap();
        assert_eq!(bounded.len(), 2);
        assert_eq!(bounded[0].title, "v2");
    }

    #[test]
    fn test_select_with_filters() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let mut draft = Record::new("article", "Draft").with_state(ContentState::Draft);
        store.save_or_update(&mut draft).unwrap();
        saved(&store, "Page");

        let query = RecordQuery::filtered(Filter::and(vec![
            Filter::eq(RecordField::Kind, "article"),
            Filter::eq(RecordField::State, ContentState::Draft),
        ]));
        let found = store.select(&query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Draft");

        let live = store
            .select(&RecordQuery::filtered(Filter::is_null(RecordField::VersionOf)))
            .unwrap();
        assert_eq!(live.len(), 2);

        let none = store
            .select(&RecordQuery::filtered(Filter::or(Vec::new())))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_on_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");

        let id = {
            let store = SqliteRecordStore::new(&path).unwrap();
            let record = saved(&store, "Persisted");
            store.flush().unwrap();
            record.id.unwrap()
        };

        let store = SqliteRecordStore::new(&path).unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().title, "Persisted");
    }
}
