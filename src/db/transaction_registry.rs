//! Transaction management.
//!
//! A transaction pins one pooled connection for its whole duration. The
//! [`Transaction`] handle passed to the block is the only way to reach that
//! connection, so work done through it always lands inside the transaction,
//! and a nested [`Transaction::transaction`] call joins the outer transaction
//! instead of issuing a second BEGIN.
//!
//! While a transaction is open its marker is recorded in the
//! [`TransactionRegistry`]. The marker is removed exactly once when the
//! transaction finishes, whether it commits, rolls back, panics or is
//! cancelled.

use super::adapter::SqlLog;
use super::decoder::RowDecoder;
use super::driver::{Connection, ExecOutcome, SQL_BEGIN, SQL_COMMIT, SQL_ROLLBACK};
use crate::error::DbResult;
use crate::models::Record;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Metadata about an open transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionMetadata {
    pub transaction_id: String,
    /// When the transaction started (absolute time)
    pub started_at: DateTime<Utc>,
    /// Seconds since transaction started
    pub duration_secs: u64,
}

struct ActiveTransaction {
    created_at: Instant,
}

/// Registry of open transaction markers.
///
/// Entries are removed synchronously from [`TransactionMarker`]'s `Drop`, so
/// the map sits behind a std mutex that is never held across an await.
#[derive(Clone)]
pub struct TransactionRegistry {
    transactions: Arc<Mutex<HashMap<String, ActiveTransaction>>>,
    /// System start time for converting Instant to DateTime
    system_start_instant: Instant,
    system_start_datetime: DateTime<Utc>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(Mutex::new(HashMap::new())),
            system_start_instant: Instant::now(),
            system_start_datetime: Utc::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActiveTransaction>> {
        // A panic while holding the lock cannot leave the map inconsistent
        self.transactions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a new open transaction and return its marker.
    pub fn enter(&self) -> TransactionMarker {
        let transaction_id = generate_transaction_id();
        self.lock().insert(
            transaction_id.clone(),
            ActiveTransaction {
                created_at: Instant::now(),
            },
        );
        TransactionMarker {
            registry: self.clone(),
            transaction_id,
        }
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.lock().contains_key(transaction_id)
    }

    /// Get the number of open transactions.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// List all open transactions with their metadata.
    pub fn list_all(&self) -> Vec<TransactionMetadata> {
        self.lock()
            .iter()
            .map(|(id, entry)| {
                let offset_from_start = entry.created_at.duration_since(self.system_start_instant);
                TransactionMetadata {
                    transaction_id: id.clone(),
                    started_at: self.system_start_datetime + offset_from_start,
                    duration_secs: entry.created_at.elapsed().as_secs(),
                }
            })
            .collect()
    }

    fn remove(&self, transaction_id: &str) -> bool {
        self.lock().remove(transaction_id).is_some()
    }
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks a transaction as open; dropping it clears the mark.
pub struct TransactionMarker {
    registry: TransactionRegistry,
    transaction_id: String,
}

impl TransactionMarker {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }
}

impl Drop for TransactionMarker {
    fn drop(&mut self) {
        if self.registry.remove(&self.transaction_id) {
            debug!(transaction_id = %self.transaction_id, "Transaction marker cleared");
        } else {
            warn!(transaction_id = %self.transaction_id, "Transaction marker already cleared");
        }
    }
}

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

// =============================================================================
// Transaction handle
// =============================================================================

/// Handle to an open transaction, valid only inside the transaction block.
pub struct Transaction<'c, C: Connection> {
    conn: &'c mut C,
    transaction_id: String,
    depth: u32,
    sql_log: SqlLog,
}

impl<'c, C: Connection> Transaction<'c, C> {
    fn new(conn: &'c mut C, transaction_id: String, sql_log: SqlLog) -> Self {
        Self {
            conn,
            transaction_id,
            depth: 0,
            sql_log,
        }
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Nesting depth; 0 for the outermost block.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Run a statement that does not return rows.
    pub async fn execute(&mut self, sql: &str) -> DbResult<ExecOutcome> {
        self.sql_log.emit(sql);
        self.conn.execute(sql).await
    }

    /// Run an INSERT and return the generated id, if any.
    pub async fn execute_insert(&mut self, sql: &str) -> DbResult<Option<u64>> {
        Ok(self.execute(sql).await?.last_insert_id)
    }

    /// Run an UPDATE or DELETE and return the number of affected rows.
    pub async fn execute_affected(&mut self, sql: &str) -> DbResult<u64> {
        Ok(self.execute(sql).await?.rows_affected)
    }

    /// Run a query and decode its rows lazily.
    pub fn query<'s>(
        &'s mut self,
        sql: &'s str,
        with_table_qualifier: bool,
    ) -> RowDecoder<C::Rows<'s>> {
        self.sql_log.emit(sql);
        RowDecoder::new(self.conn.query(sql), with_table_qualifier)
    }

    /// Run a query and decode every row.
    pub async fn fetch_all(&mut self, sql: &str) -> DbResult<Vec<Record>> {
        self.query(sql, false).collect().await
    }

    pub async fn list_tables(&mut self) -> DbResult<Vec<String>> {
        self.conn.list_tables().await
    }

    /// Run `block` inside this transaction.
    ///
    /// No BEGIN is issued; the block's work commits or rolls back together
    /// with the outermost transaction. An error returned here still reaches
    /// the outer block, which rolls back if it propagates it.
    pub async fn transaction<F, T>(&mut self, block: F) -> DbResult<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'_, C>) -> BoxFuture<'t, DbResult<T>>,
    {
        self.depth += 1;
        debug!(
            transaction_id = %self.transaction_id,
            depth = self.depth,
            "Joining open transaction"
        );
        let result = block(self).await;
        self.depth -= 1;
        result
    }
}

// =============================================================================
// Transaction lifecycle
// =============================================================================

/// Owns a checked-out connection for the duration of a transaction.
///
/// If dropped while a transaction may still be open on the server (panic,
/// cancellation, or a failed ROLLBACK) the connection is discarded rather
/// than returned to the pool.
struct HeldConnection<C: Connection> {
    conn: C,
    open: bool,
}

impl<C: Connection> Drop for HeldConnection<C> {
    fn drop(&mut self) {
        if self.open {
            warn!("Discarding connection with an unfinished transaction");
            self.conn.discard();
        }
    }
}

/// Run `block` in a new transaction on `conn`.
///
/// BEGIN is issued first. When the block succeeds its work is committed;
/// when it fails, ROLLBACK is issued once and the block's error is returned
/// unchanged. A failed COMMIT is rolled back and its error returned.
pub(crate) async fn run_transaction<C, F, T>(
    conn: C,
    registry: &TransactionRegistry,
    sql_log: &SqlLog,
    block: F,
) -> DbResult<T>
where
    C: Connection,
    F: for<'t> FnOnce(&'t mut Transaction<'_, C>) -> BoxFuture<'t, DbResult<T>>,
{
    let mut held = HeldConnection { conn, open: false };
    let marker = registry.enter();
    let transaction_id = marker.transaction_id().to_string();

    sql_log.emit(SQL_BEGIN);
    held.conn.execute(SQL_BEGIN).await?;
    held.open = true;
    info!(transaction_id = %transaction_id, "Transaction started");

    let mut tx = Transaction::new(&mut held.conn, transaction_id.clone(), sql_log.clone());
    let result = block(&mut tx).await;

    let outcome = match result {
        Ok(value) => {
            sql_log.emit(SQL_COMMIT);
            match held.conn.execute(SQL_COMMIT).await {
                Ok(_) => {
                    held.open = false;
                    info!(transaction_id = %transaction_id, "Transaction committed");
                    Ok(value)
                }
                Err(commit_err) => {
                    warn!(
                        transaction_id = %transaction_id,
                        error = %commit_err,
                        "Commit failed, rolling back"
                    );
                    held.open = !rollback(&mut held.conn, sql_log, &transaction_id).await;
                    Err(commit_err)
                }
            }
        }
        Err(err) => {
            held.open = !rollback(&mut held.conn, sql_log, &transaction_id).await;
            Err(err)
        }
    };

    drop(marker);
    outcome
}

/// Issue ROLLBACK; returns whether it succeeded.
async fn rollback<C: Connection>(conn: &mut C, sql_log: &SqlLog, transaction_id: &str) -> bool {
    sql_log.emit(SQL_ROLLBACK);
    match conn.execute(SQL_ROLLBACK).await {
        Ok(_) => {
            info!(transaction_id = %transaction_id, "Transaction rolled back");
            true
        }
        Err(e) => {
            warn!(
                transaction_id = %transaction_id,
                error = %e,
                "Rollback failed"
            );
            false
        }
    }
}
