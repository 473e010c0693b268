//! Row decoding.
//!
//! [`RowDecoder`] turns the raw rows of a streaming result into [`Record`]s,
//! coercing each column through the table in [`crate::db::types`].

use super::driver::{FieldInfo, RowSource};
use super::types::coerce;
use crate::error::{DbError, DbResult};
use crate::models::Record;
use serde::Serialize;

/// Per-column metadata, computed once per result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub index: usize,
    pub type_code: u8,
}

impl ColumnDescriptor {
    fn from_field(index: usize, field: &FieldInfo) -> Self {
        Self {
            name: field.name.clone(),
            table: field.table.clone(),
            index,
            type_code: field.type_code,
        }
    }

    /// The record key for this column.
    ///
    /// With table qualification the key is `table.name`; columns the driver
    /// reports no table for (expressions, or drivers without that metadata)
    /// keep their bare name.
    pub fn key(&self, with_table_qualifier: bool) -> String {
        match (&self.table, with_table_qualifier) {
            (Some(table), true) if !table.is_empty() => format!("{}.{}", table, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Lazily decodes a result set, one record per call to [`RowDecoder::next`].
///
/// The decoder owns the result source. Dropping it (or calling
/// [`RowDecoder::release`]) before the end releases the server-side result.
pub struct RowDecoder<R> {
    source: R,
    with_table_qualifier: bool,
    columns: Vec<ColumnDescriptor>,
    keys: Vec<String>,
    finished: bool,
}

impl<R: RowSource> RowDecoder<R> {
    pub fn new(source: R, with_table_qualifier: bool) -> Self {
        Self {
            source,
            with_table_qualifier,
            columns: Vec::new(),
            keys: Vec::new(),
            finished: false,
        }
    }

    /// Column descriptors. Empty until the first row has been decoded.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Decode the next row, or return `None` once the result is exhausted.
    ///
    /// The sequence is not restartable: after `None` every further call
    /// returns `None` without touching the source.
    pub async fn next(&mut self) -> DbResult<Option<Record>> {
        if self.finished {
            return Ok(None);
        }

        let Some(row) = self.source.fetch_row().await? else {
            self.finished = true;
            return Ok(None);
        };

        if self.columns.is_empty() {
            self.load_columns();
        }

        if row.len() != self.columns.len() {
            return Err(DbError::internal(format!(
                "Row has {} values but the result has {} columns",
                row.len(),
                self.columns.len()
            )));
        }

        let mut record = Record::with_capacity(self.columns.len());
        for ((column, key), raw) in self.columns.iter().zip(&self.keys).zip(row) {
            let value = coerce(raw.as_deref(), column.type_code).map_err(|message| {
                DbError::coercion(
                    &column.name,
                    column.type_code,
                    raw.as_deref()
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                        .unwrap_or_default(),
                    message,
                )
            })?;
            record.insert(key.as_str(), value);
        }

        Ok(Some(record))
    }

    /// Decode every remaining row.
    pub async fn collect(mut self) -> DbResult<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Invoke `f` for every remaining row, stopping at the first error.
    ///
    /// Returns the number of rows visited.
    pub async fn for_each<F>(mut self, mut f: F) -> DbResult<u64>
    where
        F: FnMut(Record) -> DbResult<()>,
    {
        let mut count = 0;
        while let Some(record) = self.next().await? {
            f(record)?;
            count += 1;
        }
        Ok(count)
    }

    /// Stop decoding and release the underlying result.
    pub fn release(self) {}

    fn load_columns(&mut self) {
        self.columns = self
            .source
            .fetch_fields()
            .iter()
            .enumerate()
            .map(|(index, field)| ColumnDescriptor::from_field(index, field))
            .collect();
        self.keys = self
            .columns
            .iter()
            .map(|c| c.key(self.with_table_qualifier))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::driver::RawRow;
    use crate::models::Value;
    use std::collections::VecDeque;

    struct StaticRows {
        fields: Vec<FieldInfo>,
        rows: VecDeque<RawRow>,
        fetches: usize,
    }

    impl StaticRows {
        fn new(fields: Vec<FieldInfo>, rows: Vec<Vec<Option<&str>>>) -> Self {
            Self {
                fields,
                rows: rows
                    .into_iter()
                    .map(|r| r.into_iter().map(|v| v.map(|s| s.as_bytes().to_vec())).collect())
                    .collect(),
                fetches: 0,
            }
        }
    }

    impl RowSource for StaticRows {
        async fn fetch_row(&mut self) -> DbResult<Option<RawRow>> {
            self.fetches += 1;
            Ok(self.rows.pop_front())
        }

        fn fetch_fields(&self) -> &[FieldInfo] {
            &self.fields
        }
    }

    fn post_fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::new("id", 3).with_table("posts"),
            FieldInfo::new("title", 253).with_table("posts"),
        ]
    }

    #[tokio::test]
    async fn test_decodes_rows_in_column_order() {
        let source = StaticRows::new(
            post_fields(),
            vec![vec![Some("1"), Some("hello")], vec![Some("2"), None]],
        );
        let records = RowDecoder::new(source, false).collect().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["id", "title"]);
        assert_eq!(records[0].get("id"), Some(&Value::Integer(1)));
        assert_eq!(records[0].get("title"), Some(&Value::Text("hello".into())));
        assert_eq!(records[1].get("title"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_table_qualified_keys() {
        let mut fields = post_fields();
        fields.push(FieldInfo::new("total", 8));
        let source = StaticRows::new(fields, vec![vec![Some("1"), Some("a"), Some("5")]]);

        let mut decoder = RowDecoder::new(source, true);
        let record = decoder.next().await.unwrap().unwrap();
        assert_eq!(
            record.keys().collect::<Vec<_>>(),
            vec!["posts.id", "posts.title", "total"]
        );
        assert_eq!(decoder.columns()[2].index, 2);
    }

    #[tokio::test]
    async fn test_not_restartable() {
        let source = StaticRows::new(post_fields(), vec![vec![Some("1"), Some("a")]]);
        let mut decoder = RowDecoder::new(source, false);

        assert!(decoder.next().await.unwrap().is_some());
        assert!(decoder.next().await.unwrap().is_none());
        assert!(decoder.next().await.unwrap().is_none());
        assert_eq!(decoder.source.fetches, 2);
    }

    #[tokio::test]
    async fn test_coercion_failure_names_the_column() {
        let source = StaticRows::new(post_fields(), vec![vec![Some("oops"), Some("a")]]);
        let err = RowDecoder::new(source, false).collect().await.unwrap_err();

        match err {
            DbError::Coercion { column, type_code, value, .. } => {
                assert_eq!(column, "id");
                assert_eq!(type_code, 3);
                assert_eq!(value, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_result() {
        let source = StaticRows::new(post_fields(), vec![]);
        let count = RowDecoder::new(source, false)
            .for_each(|_| Ok(()))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
