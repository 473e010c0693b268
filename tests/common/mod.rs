//! Scripted in-memory driver for integration tests.
//!
//! Records every statement with the id of the connection that ran it,
//! tracks CREATE/DROP TABLE in a table set, fails statements matching a
//! configured pattern, and serves canned query results.

#![allow(dead_code)]

use relmap::db::{Adapter, Connection, ConnectionPool, ExecOutcome, FieldInfo, RawRow, RowSource};
use relmap::error::{DbError, DbResult};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub connection: usize,
    pub sql: String,
}

#[derive(Default)]
struct MockState {
    statements: Mutex<Vec<Statement>>,
    tables: Mutex<BTreeSet<String>>,
    failures: Mutex<Vec<String>>,
    results: Mutex<HashMap<String, (Vec<FieldInfo>, Vec<RawRow>)>>,
    next_connection: AtomicUsize,
    released: AtomicUsize,
    discarded: AtomicUsize,
    next_insert_id: AtomicU64,
}

#[derive(Clone, Default)]
pub struct MockPool {
    state: Arc<MockState>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adapter(&self) -> Adapter<MockPool> {
        Adapter::new(self.clone())
    }

    /// Every statement executed so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.recorded().into_iter().map(|s| s.sql).collect()
    }

    pub fn recorded(&self) -> Vec<Statement> {
        self.state.statements.lock().unwrap().clone()
    }

    pub fn count(&self, sql: &str) -> usize {
        self.statements().iter().filter(|s| *s == sql).count()
    }

    pub fn clear_statements(&self) {
        self.state.statements.lock().unwrap().clear();
    }

    /// Make every statement containing `pattern` fail.
    pub fn fail_on(&self, pattern: &str) {
        self.state.failures.lock().unwrap().push(pattern.to_string());
    }

    pub fn add_table(&self, name: &str) {
        self.state.tables.lock().unwrap().insert(name.to_string());
    }

    pub fn tables(&self) -> Vec<String> {
        self.state.tables.lock().unwrap().iter().cloned().collect()
    }

    /// Serve `rows` for queries whose text is exactly `sql`.
    pub fn set_result(&self, sql: &str, fields: Vec<FieldInfo>, rows: Vec<Vec<Option<&str>>>) {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|v| v.map(|s| s.as_bytes().to_vec())).collect())
            .collect();
        self.state
            .results
            .lock()
            .unwrap()
            .insert(sql.to_string(), (fields, rows));
    }

    pub fn acquired(&self) -> usize {
        self.state.next_connection.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn discarded(&self) -> usize {
        self.state.discarded.load(Ordering::SeqCst)
    }
}

impl MockState {
    fn record(&self, connection: usize, sql: &str) -> DbResult<()> {
        self.statements.lock().unwrap().push(Statement {
            connection,
            sql: sql.to_string(),
        });
        let failures = self.failures.lock().unwrap();
        if let Some(pattern) = failures.iter().find(|p| sql.contains(p.as_str())) {
            return Err(DbError::database(
                format!("scripted failure on '{pattern}'"),
                Some("HY000".to_string()),
                "none",
            ));
        }
        Ok(())
    }
}

impl ConnectionPool for MockPool {
    type Connection = MockConnection;

    async fn acquire(&self) -> DbResult<MockConnection> {
        let id = self.state.next_connection.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockConnection {
            id,
            state: Arc::clone(&self.state),
            discarded: false,
        })
    }
}

pub struct MockConnection {
    id: usize,
    state: Arc<MockState>,
    discarded: bool,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
        if self.discarded {
            self.state.discarded.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn table_after<'a>(sql: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = sql.strip_prefix(prefix)?;
    let name = rest.split_whitespace().next()?;
    Some(name.trim_matches('`'))
}

impl Connection for MockConnection {
    type Rows<'c>
        = MockRows
    where
        Self: 'c;

    async fn execute(&mut self, sql: &str) -> DbResult<ExecOutcome> {
        self.state.record(self.id, sql)?;

        if let Some(table) = table_after(sql, "CREATE TABLE ") {
            self.state.tables.lock().unwrap().insert(table.to_string());
        } else if let Some(table) = table_after(sql, "DROP TABLE ") {
            self.state.tables.lock().unwrap().remove(table);
        }

        let last_insert_id = sql
            .starts_with("INSERT")
            .then(|| self.state.next_insert_id.fetch_add(1, Ordering::SeqCst) + 1);
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id,
        })
    }

    fn query<'c>(&'c mut self, sql: &'c str) -> MockRows {
        let outcome = self.state.record(self.id, sql);
        let (fields, rows) = self
            .state
            .results
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .unwrap_or_default();
        MockRows {
            error: outcome.err(),
            fields,
            pending: Vec::new(),
            rows: rows.into(),
        }
    }

    async fn list_tables(&mut self) -> DbResult<Vec<String>> {
        self.state.record(self.id, "SHOW TABLES")?;
        Ok(self.state.tables.lock().unwrap().iter().cloned().collect())
    }

    fn discard(&mut self) {
        self.discarded = true;
    }
}

pub struct MockRows {
    error: Option<DbError>,
    fields: Vec<FieldInfo>,
    // fields are reported only after the first fetch
    pending: Vec<FieldInfo>,
    rows: VecDeque<RawRow>,
}

impl RowSource for MockRows {
    async fn fetch_row(&mut self) -> DbResult<Option<RawRow>> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if self.pending.is_empty() {
            self.pending = self.fields.clone();
        }
        Ok(self.rows.pop_front())
    }

    fn fetch_fields(&self) -> &[FieldInfo] {
        &self.pending
    }
}
