//! The adapter: the single entry point for executing SQL.
//!
//! Every operation checks a connection out of the pool for its own duration
//! and returns it when done, on success and on error alike. Transactions pin
//! one connection until they finish; see [`crate::db::transaction_registry`].

use super::decoder::RowDecoder;
use super::driver::{Connection, ConnectionPool, ExecOutcome};
use super::transaction_registry::{
    Transaction, TransactionMetadata, TransactionRegistry, run_transaction,
};
use crate::dataset::Dataset;
use crate::dialect::{MySqlDialect, SqlDialect};
use crate::error::DbResult;
use crate::models::{Record, TableSchema};
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A callback receiving every SQL statement before it is executed.
pub type SqlLogger = Arc<dyn Fn(&str) + Send + Sync>;

/// Diagnostic sink for executed SQL.
///
/// Statements are always traced at debug level; the optional logger
/// additionally receives each one. Without a logger emitting is a no-op
/// beyond the debug trace.
#[derive(Clone, Default)]
pub struct SqlLog {
    logger: Option<SqlLogger>,
}

impl SqlLog {
    pub fn new(logger: Option<SqlLogger>) -> Self {
        Self { logger }
    }

    /// A logger that forwards statements to `tracing` at info level.
    pub fn to_tracing() -> Self {
        Self::new(Some(Arc::new(|sql: &str| {
            info!(target: "relmap::sql", "{}", sql);
        })))
    }

    pub fn is_enabled(&self) -> bool {
        self.logger.is_some()
    }

    pub fn emit(&self, sql: &str) {
        debug!(sql = %sql, "Executing SQL");
        if let Some(logger) = &self.logger {
            logger(sql);
        }
    }
}

impl fmt::Debug for SqlLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlLog")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

struct AdapterInner<P> {
    pool: P,
    dialect: MySqlDialect,
    transactions: TransactionRegistry,
}

/// Executes SQL against a connection pool.
///
/// Cloning is cheap; clones share the pool and the transaction registry.
pub struct Adapter<P: ConnectionPool> {
    inner: Arc<AdapterInner<P>>,
    sql_log: SqlLog,
}

impl<P: ConnectionPool> Clone for Adapter<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            sql_log: self.sql_log.clone(),
        }
    }
}

impl<P: ConnectionPool> fmt::Debug for Adapter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("dialect", &self.inner.dialect.name())
            .field("active_transactions", &self.active_transactions())
            .field("sql_log", &self.sql_log)
            .finish()
    }
}

impl<P: ConnectionPool> Adapter<P> {
    pub fn new(pool: P) -> Self {
        Self {
            inner: Arc::new(AdapterInner {
                pool,
                dialect: MySqlDialect,
                transactions: TransactionRegistry::new(),
            }),
            sql_log: SqlLog::default(),
        }
    }

    /// Send every statement this adapter executes to `sql_log`.
    pub fn with_sql_log(mut self, sql_log: SqlLog) -> Self {
        self.sql_log = sql_log;
        self
    }

    pub fn pool(&self) -> &P {
        &self.inner.pool
    }

    pub fn dialect(&self) -> &MySqlDialect {
        &self.inner.dialect
    }

    pub fn sql_log(&self) -> &SqlLog {
        &self.sql_log
    }

    pub fn transactions(&self) -> &TransactionRegistry {
        &self.inner.transactions
    }

    /// Number of transactions currently open through this adapter.
    pub fn active_transactions(&self) -> usize {
        self.inner.transactions.count()
    }

    pub fn list_active_transactions(&self) -> Vec<TransactionMetadata> {
        self.inner.transactions.list_all()
    }

    /// Run a statement that does not return rows.
    pub async fn execute(&self, sql: &str) -> DbResult<ExecOutcome> {
        let mut conn = self.inner.pool.acquire().await?;
        self.sql_log.emit(sql);
        conn.execute(sql).await
    }

    /// Run an INSERT and return the generated id, or `None` if none was generated.
    pub async fn execute_insert(&self, sql: &str) -> DbResult<Option<u64>> {
        Ok(self.execute(sql).await?.last_insert_id)
    }

    /// Run an UPDATE or DELETE and return the number of affected rows.
    pub async fn execute_affected(&self, sql: &str) -> DbResult<u64> {
        Ok(self.execute(sql).await?.rows_affected)
    }

    /// Stream a query's rows through `on_row`, decoding them one at a time.
    ///
    /// The connection stays checked out until the result is drained or
    /// `on_row` returns an error. Returns the number of rows visited.
    pub async fn query<F>(&self, sql: &str, with_table_qualifier: bool, on_row: F) -> DbResult<u64>
    where
        F: FnMut(Record) -> DbResult<()>,
    {
        let mut conn = self.inner.pool.acquire().await?;
        self.sql_log.emit(sql);
        RowDecoder::new(conn.query(sql), with_table_qualifier)
            .for_each(on_row)
            .await
    }

    /// Run a query and decode every row.
    pub async fn fetch_all(&self, sql: &str) -> DbResult<Vec<Record>> {
        let mut conn = self.inner.pool.acquire().await?;
        self.sql_log.emit(sql);
        RowDecoder::new(conn.query(sql), false).collect().await
    }

    /// Names of the tables in the connected schema.
    pub async fn list_tables(&self) -> DbResult<Vec<String>> {
        let mut conn = self.inner.pool.acquire().await?;
        conn.list_tables().await
    }

    pub async fn table_exists(&self, name: &str) -> DbResult<bool> {
        Ok(self.list_tables().await?.iter().any(|t| t == name))
    }

    pub async fn create_table(&self, schema: &TableSchema) -> DbResult<()> {
        let sql = self.inner.dialect.create_table_sql(schema);
        self.execute(&sql).await?;
        info!(table = %schema.name, "Table created");
        Ok(())
    }

    pub async fn drop_table(&self, name: &str) -> DbResult<()> {
        let sql = self.inner.dialect.drop_table_sql(name);
        self.execute(&sql).await?;
        info!(table = %name, "Table dropped");
        Ok(())
    }

    /// A dataset over `table` bound to this adapter.
    pub fn dataset(&self, table: impl Into<String>) -> Dataset<P> {
        Dataset::new(self.clone(), table)
    }

    /// Run `block` inside a transaction on a dedicated connection.
    ///
    /// The block receives a [`Transaction`] handle; everything executed
    /// through it shares the transaction, including nested
    /// [`Transaction::transaction`] blocks. The work is committed when the
    /// block returns `Ok`. When it returns `Err`, ROLLBACK is issued once and
    /// that error is returned unchanged.
    ///
    /// ```ignore
    /// adapter
    ///     .transaction(|tx| {
    ///         Box::pin(async move {
    ///             tx.execute("UPDATE `posts` SET `title`='x'").await?;
    ///             Ok(())
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<F, T>(&self, block: F) -> DbResult<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'_, P::Connection>) -> BoxFuture<'t, DbResult<T>>
            + Send,
        T: Send,
    {
        let conn = self.inner.pool.acquire().await?;
        run_transaction(conn, &self.inner.transactions, &self.sql_log, block).await
    }
}
