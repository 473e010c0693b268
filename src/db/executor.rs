//! Where SQL runs: the adapter, or an open transaction.
//!
//! Datasets, entity instances and join tables render their SQL and hand it
//! to an [`Executor`]. Passing the adapter checks out a fresh connection per
//! statement; passing a transaction handle (reborrowed with `&mut *tx`) keeps
//! the statement on the transaction's connection.

use super::adapter::Adapter;
use super::driver::{Connection, ConnectionPool, ExecOutcome};
use super::transaction_registry::Transaction;
use crate::dialect::MySqlDialect;
use crate::error::DbResult;
use crate::models::Record;
use futures_util::future::BoxFuture;

pub trait Executor<'e>: Send + Sized {
    fn dialect(&self) -> &MySqlDialect;

    /// Run a statement that does not return rows.
    fn execute(self, sql: String) -> BoxFuture<'e, DbResult<ExecOutcome>>;

    /// Run a query and decode every row.
    fn fetch_all(self, sql: String) -> BoxFuture<'e, DbResult<Vec<Record>>>;
}

impl<'e, P: ConnectionPool> Executor<'e> for &'e Adapter<P> {
    fn dialect(&self) -> &MySqlDialect {
        Adapter::dialect(self)
    }

    fn execute(self, sql: String) -> BoxFuture<'e, DbResult<ExecOutcome>> {
        Box::pin(async move { Adapter::execute(self, &sql).await })
    }

    fn fetch_all(self, sql: String) -> BoxFuture<'e, DbResult<Vec<Record>>> {
        Box::pin(async move { Adapter::fetch_all(self, &sql).await })
    }
}

impl<'e, 'c: 'e, C: Connection> Executor<'e> for &'e mut Transaction<'c, C> {
    fn dialect(&self) -> &MySqlDialect {
        &MySqlDialect
    }

    fn execute(self, sql: String) -> BoxFuture<'e, DbResult<ExecOutcome>> {
        Box::pin(async move { Transaction::execute(self, &sql).await })
    }

    fn fetch_all(self, sql: String) -> BoxFuture<'e, DbResult<Vec<Record>>> {
        Box::pin(async move { Transaction::fetch_all(self, &sql).await })
    }
}
