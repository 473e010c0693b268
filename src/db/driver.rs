//! Driver and pool seams.
//!
//! The adapter, transaction manager and join table engine only talk to the
//! database through these traits. `crate::db::pool` implements them for
//! `sqlx::MySqlPool`; tests implement them with a scripted in-memory driver.

use crate::error::DbResult;
use std::future::Future;

pub const SQL_BEGIN: &str = "BEGIN";
pub const SQL_COMMIT: &str = "COMMIT";
pub const SQL_ROLLBACK: &str = "ROLLBACK";

/// Column metadata as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    /// Originating table, when the driver reports one.
    pub table: Option<String>,
    /// MySQL field type code, see [`crate::db::types::FieldType`].
    pub type_code: u8,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, type_code: u8) -> Self {
        Self {
            name: name.into(),
            table: None,
            type_code,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

/// One raw row: textual column values in column order, `None` for SQL NULL.
pub type RawRow = Vec<Option<Vec<u8>>>;

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Server-assigned AUTO_INCREMENT id; `None` when the statement generated none.
    pub last_insert_id: Option<u64>,
}

/// A forward-only, unbuffered result set.
pub trait RowSource: Send {
    /// Fetch the next raw row, or `None` at the end of the result.
    fn fetch_row(&mut self) -> impl Future<Output = DbResult<Option<RawRow>>> + Send;

    /// Column metadata. Available once the first row has been fetched.
    fn fetch_fields(&self) -> &[FieldInfo];
}

/// A live session to the database, exclusively owned while checked out.
pub trait Connection: Send {
    type Rows<'c>: RowSource + 'c
    where
        Self: 'c;

    /// Run a statement that does not return rows.
    fn execute(&mut self, sql: &str) -> impl Future<Output = DbResult<ExecOutcome>> + Send;

    /// Run a statement in streaming mode; rows are pulled one at a time.
    ///
    /// Dropping the returned source releases the server-side result.
    fn query<'c>(&'c mut self, sql: &'c str) -> Self::Rows<'c>;

    /// Names of the tables in the current schema.
    fn list_tables(&mut self) -> impl Future<Output = DbResult<Vec<String>>> + Send;

    /// Mark the connection as unusable so it is closed rather than returned to the pool.
    fn discard(&mut self);
}

/// A pool that checks out exclusively-owned connections.
///
/// A checked-out connection returns to the pool when dropped.
pub trait ConnectionPool: Send + Sync + 'static {
    type Connection: Connection + 'static;

    /// Check out a connection, waiting until one is available.
    fn acquire(&self) -> impl Future<Output = DbResult<Self::Connection>> + Send;
}
