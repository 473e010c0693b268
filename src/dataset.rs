//! Datasets: a table plus persisted clause options, bound to an adapter.
//!
//! Builder methods return a new dataset; SQL is rendered by the adapter's
//! dialect and executed through the adapter. The `_in` variants run the same
//! statement through any [`Executor`], such as an open transaction.

use crate::db::{Adapter, ConnectionPool, Executor};
use crate::dialect::{DatasetOptions, SqlDialect};
use crate::error::DbResult;
use crate::models::{Record, Value};

#[derive(Debug)]
pub struct Dataset<P: ConnectionPool> {
    adapter: Adapter<P>,
    table: String,
    opts: DatasetOptions,
}

impl<P: ConnectionPool> Clone for Dataset<P> {
    fn clone(&self) -> Self {
        Self {
            adapter: self.adapter.clone(),
            table: self.table.clone(),
            opts: self.opts.clone(),
        }
    }
}

impl<P: ConnectionPool> Dataset<P> {
    pub fn new(adapter: Adapter<P>, table: impl Into<String>) -> Self {
        Self {
            adapter,
            table: table.into(),
            opts: DatasetOptions::default(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.opts
    }

    /// Restrict the selected fields.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.opts.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Add a raw WHERE condition, ANDed with any existing one.
    pub fn filter(mut self, condition: impl AsRef<str>) -> Self {
        let condition = format!("({})", condition.as_ref());
        self.opts.filter = Some(match self.opts.filter.take() {
            Some(existing) => format!("{existing} AND {condition}"),
            None => condition,
        });
        self
    }

    /// Add an equality condition on `column`.
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        let condition = self
            .adapter
            .dialect()
            .equality_condition(column, &value.into());
        self.filter(condition)
    }

    /// Set the ORDER BY field expressions, e.g. `["id DESC"]`.
    pub fn order<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.opts.order = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.opts.limit = Some(limit);
        self
    }

    pub fn select_sql(&self) -> String {
        self.adapter.dialect().select_sql(&self.table, &self.opts)
    }

    pub fn insert_sql(&self, values: &Record) -> String {
        self.adapter.dialect().insert_sql(&self.table, values)
    }

    pub fn update_sql(&self, values: &Record, overrides: Option<&DatasetOptions>) -> String {
        self.adapter
            .dialect()
            .update_sql(&self.table, values, &self.opts, overrides)
    }

    pub fn delete_sql(&self) -> String {
        self.adapter.dialect().delete_sql(&self.table, &self.opts)
    }

    /// Fetch every matching row.
    pub async fn all(&self) -> DbResult<Vec<Record>> {
        self.all_in(&self.adapter).await
    }

    /// Fetch every matching row through `executor`.
    pub async fn all_in<'e, E: Executor<'e>>(&self, executor: E) -> DbResult<Vec<Record>> {
        executor.fetch_all(self.select_sql()).await
    }

    /// Stream matching rows through `on_row`.
    pub async fn each<F>(&self, on_row: F) -> DbResult<u64>
    where
        F: FnMut(Record) -> DbResult<()>,
    {
        self.adapter.query(&self.select_sql(), false, on_row).await
    }

    /// Fetch the first matching row.
    pub async fn first(&self) -> DbResult<Option<Record>> {
        self.first_in(&self.adapter).await
    }

    pub async fn first_in<'e, E: Executor<'e>>(&self, executor: E) -> DbResult<Option<Record>> {
        let sql = self.adapter.dialect().select_sql(
            &self.table,
            &self.opts.merge(&DatasetOptions::default().with_limit(1)),
        );
        Ok(executor.fetch_all(sql).await?.into_iter().next())
    }

    /// Insert a row and return the generated id, if any.
    pub async fn insert(&self, values: &Record) -> DbResult<Option<u64>> {
        self.insert_in(&self.adapter, values).await
    }

    pub async fn insert_in<'e, E: Executor<'e>>(
        &self,
        executor: E,
        values: &Record,
    ) -> DbResult<Option<u64>> {
        Ok(executor.execute(self.insert_sql(values)).await?.last_insert_id)
    }

    /// Update matching rows and return the number affected.
    pub async fn update(&self, values: &Record) -> DbResult<u64> {
        self.update_in(&self.adapter, values, None).await
    }

    /// Update with per-call options laid over this dataset's options.
    pub async fn update_with(&self, values: &Record, overrides: &DatasetOptions) -> DbResult<u64> {
        self.update_in(&self.adapter, values, Some(overrides)).await
    }

    pub async fn update_in<'e, E: Executor<'e>>(
        &self,
        executor: E,
        values: &Record,
        overrides: Option<&DatasetOptions>,
    ) -> DbResult<u64> {
        let sql = self.update_sql(values, overrides);
        Ok(executor.execute(sql).await?.rows_affected)
    }

    /// Delete matching rows and return the number affected.
    pub async fn delete(&self) -> DbResult<u64> {
        self.delete_in(&self.adapter).await
    }

    pub async fn delete_in<'e, E: Executor<'e>>(&self, executor: E) -> DbResult<u64> {
        Ok(executor.execute(self.delete_sql()).await?.rows_affected)
    }
}
