//! SQL rendering.
//!
//! [`SqlDialect`] is a strategy trait: its provided methods render portable
//! SQL, and a dialect overrides only what its database does differently.
//! The portable renderers are also exposed as free functions in [`generic`]
//! so an overriding dialect can build on them.

pub mod mysql;

pub use mysql::MySqlDialect;

use crate::models::{Record, TableSchema, Value};

/// Clause options persisted on a dataset or passed per call.
///
/// Every field is optional so that a per-call option set can override a
/// persisted one key by key; see [`DatasetOptions::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetOptions {
    /// Selected field expressions; `None` selects `*`.
    pub select: Option<Vec<String>>,
    /// Rendered WHERE condition.
    pub filter: Option<String>,
    /// ORDER BY field expressions, e.g. `id DESC`.
    pub order: Option<Vec<String>>,
    pub limit: Option<u64>,
}

impl DatasetOptions {
    /// Overlay `overrides` on top of `self`. Keys present in `overrides` win;
    /// absent keys fall back to `self`.
    pub fn merge(&self, overrides: &DatasetOptions) -> DatasetOptions {
        DatasetOptions {
            select: overrides.select.clone().or_else(|| self.select.clone()),
            filter: overrides.filter.clone().or_else(|| self.filter.clone()),
            order: overrides.order.clone().or_else(|| self.order.clone()),
            limit: overrides.limit.or(self.limit),
        }
    }

    pub fn with_order<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Dialect-specific SQL rendering.
pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &str;

    /// Quote a plain identifier (table or column name).
    fn quote_identifier(&self, name: &str) -> String {
        name.to_string()
    }

    /// Render a field expression as it appears in a select list or ORDER BY.
    fn field_name(&self, field: &str) -> String {
        self.quote_identifier(field)
    }

    /// Render a value as a SQL literal.
    fn literal(&self, value: &Value) -> String {
        generic::literal(value)
    }

    /// Render a comma separated field list; empty renders as `*`.
    fn field_list(&self, fields: &[String]) -> String {
        if fields.is_empty() {
            return "*".to_string();
        }
        fields
            .iter()
            .map(|f| self.field_name(f))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select_sql(&self, table: &str, opts: &DatasetOptions) -> String {
        generic::select_sql(self, table, opts)
    }

    fn insert_sql(&self, table: &str, values: &Record) -> String {
        generic::insert_sql(self, table, values)
    }

    /// Render an UPDATE. `overrides` are per-call options laid over the
    /// dataset's persisted `opts`.
    fn update_sql(
        &self,
        table: &str,
        values: &Record,
        opts: &DatasetOptions,
        overrides: Option<&DatasetOptions>,
    ) -> String {
        let merged = overrides.map_or_else(|| opts.clone(), |o| opts.merge(o));
        generic::update_sql(self, table, values, &merged)
    }

    fn delete_sql(&self, table: &str, opts: &DatasetOptions) -> String {
        generic::delete_sql(self, table, opts)
    }

    fn create_table_sql(&self, schema: &TableSchema) -> String {
        generic::create_table_sql(self, schema)
    }

    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    /// Render an equality condition; NULL compares with `IS NULL`.
    fn equality_condition(&self, column: &str, value: &Value) -> String {
        match value {
            Value::Null => format!("{} IS NULL", self.quote_identifier(column)),
            v => format!("{} = {}", self.quote_identifier(column), self.literal(v)),
        }
    }
}

/// Portable renderers shared by every dialect.
pub mod generic {
    use super::{DatasetOptions, SqlDialect};
    use crate::models::{Record, TableSchema, Value};

    const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

    /// Render a value as a portable SQL literal.
    pub fn literal(value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) if v.is_finite() => v.to_string(),
            Value::Float(v) => quote_string(&v.to_string()),
            Value::Timestamp(v) => quote_string(&v.format(TIMESTAMP_FORMAT).to_string()),
            Value::Date(v) => quote_string(&v.format("%Y-%m-%d").to_string()),
            Value::Time(v) => quote_string(&v.format("%H:%M:%S%.f").to_string()),
            Value::Text(v) => quote_string(v),
            Value::Bytes(v) => {
                let hex: String = v.iter().map(|b| format!("{b:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Single-quote a string, doubling embedded quotes.
    pub fn quote_string(s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    fn push_where(sql: &mut String, opts: &DatasetOptions) {
        if let Some(filter) = opts.filter.as_deref().filter(|f| !f.is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
    }

    pub fn select_sql<D: SqlDialect + ?Sized>(d: &D, table: &str, opts: &DatasetOptions) -> String {
        let fields = opts.select.as_deref().unwrap_or_default();
        let mut sql = format!(
            "SELECT {} FROM {}",
            d.field_list(fields),
            d.quote_identifier(table)
        );
        push_where(&mut sql, opts);
        if let Some(order) = opts.order.as_deref().filter(|o| !o.is_empty()) {
            sql.push_str(&format!(" ORDER BY {}", d.field_list(order)));
        }
        if let Some(limit) = opts.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }

    pub fn insert_sql<D: SqlDialect + ?Sized>(d: &D, table: &str, values: &Record) -> String {
        let table = d.quote_identifier(table);
        if values.is_empty() {
            return format!("INSERT INTO {table} DEFAULT VALUES");
        }

        let columns = values
            .keys()
            .map(|k| d.quote_identifier(k))
            .collect::<Vec<_>>()
            .join(", ");
        let literals = values
            .iter()
            .map(|(_, v)| d.literal(v))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO {table} ({columns}) VALUES ({literals})")
    }

    /// Render `UPDATE ... SET ... [WHERE ...]` without any ordering or limit.
    pub fn update_sql<D: SqlDialect + ?Sized>(
        d: &D,
        table: &str,
        values: &Record,
        opts: &DatasetOptions,
    ) -> String {
        let assignments = values
            .iter()
            .map(|(k, v)| format!("{}={}", d.quote_identifier(k), d.literal(v)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {} SET {}", d.quote_identifier(table), assignments);
        push_where(&mut sql, opts);
        sql
    }

    pub fn delete_sql<D: SqlDialect + ?Sized>(d: &D, table: &str, opts: &DatasetOptions) -> String {
        let mut sql = format!("DELETE FROM {}", d.quote_identifier(table));
        push_where(&mut sql, opts);
        sql
    }

    pub fn create_table_sql<D: SqlDialect + ?Sized>(d: &D, schema: &TableSchema) -> String {
        let mut parts: Vec<String> = schema
            .columns
            .iter()
            .map(|c| {
                let null = if c.nullable { "" } else { " NOT NULL" };
                format!("{} {}{}", d.quote_identifier(&c.name), c.sql_type, null)
            })
            .collect();

        if !schema.primary_key.is_empty() {
            let pk = schema
                .primary_key
                .iter()
                .map(|c| d.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("PRIMARY KEY ({pk})"));
        }

        format!(
            "CREATE TABLE {} ({})",
            d.quote_identifier(&schema.name),
            parts.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnSpec;
    use chrono::NaiveDate;

    struct Portable;

    impl SqlDialect for Portable {
        fn name(&self) -> &str {
            "portable"
        }
    }

    #[test]
    fn test_merge_overrides_per_key() {
        let persisted = DatasetOptions::default()
            .with_order(["id DESC"])
            .with_limit(10)
            .with_filter("(published = 1)");
        let overrides = DatasetOptions::default().with_limit(5);

        let merged = persisted.merge(&overrides);
        assert_eq!(merged.limit, Some(5));
        assert_eq!(merged.order, Some(vec!["id DESC".to_string()]));
        assert_eq!(merged.filter.as_deref(), Some("(published = 1)"));
    }

    #[test]
    fn test_generic_literals() {
        assert_eq!(generic::literal(&Value::Null), "NULL");
        assert_eq!(generic::literal(&Value::Integer(-3)), "-3");
        assert_eq!(generic::literal(&Value::Text("it's".into())), "'it''s'");
        assert_eq!(generic::literal(&Value::Boolean(true)), "TRUE");
        assert_eq!(generic::literal(&Value::Bytes(vec![0xAB, 0x01])), "X'AB01'");

        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(generic::literal(&Value::Timestamp(ts)), "'2024-01-02 03:04:05'");
    }

    #[test]
    fn test_portable_statements() {
        let d = Portable;
        let values = Record::new().with("title", "x");

        assert_eq!(
            d.insert_sql("posts", &values),
            "INSERT INTO posts (title) VALUES ('x')"
        );
        assert_eq!(
            d.insert_sql("posts", &Record::new()),
            "INSERT INTO posts DEFAULT VALUES"
        );

        let opts = DatasetOptions::default()
            .with_order(["id DESC"])
            .with_limit(10);
        // The portable renderer has no ordered or limited UPDATE
        assert_eq!(
            d.update_sql("posts", &values, &opts, None),
            "UPDATE posts SET title='x'"
        );
        assert_eq!(
            d.select_sql("posts", &opts),
            "SELECT * FROM posts ORDER BY id DESC LIMIT 10"
        );
        assert_eq!(
            d.delete_sql("posts", &DatasetOptions::default().with_filter("id = 1")),
            "DELETE FROM posts WHERE id = 1"
        );
    }

    #[test]
    fn test_portable_create_table() {
        let schema = TableSchema::new("comments_posts")
            .column(ColumnSpec::new("post_id", "integer").not_null())
            .column(ColumnSpec::new("note", "text"))
            .with_primary_key(["post_id"]);

        assert_eq!(
            Portable.create_table_sql(&schema),
            "CREATE TABLE comments_posts (post_id integer NOT NULL, note text, PRIMARY KEY (post_id))"
        );
    }

    #[test]
    fn test_equality_condition() {
        assert_eq!(Portable.equality_condition("id", &Value::Integer(1)), "id = 1");
        assert_eq!(Portable.equality_condition("id", &Value::Null), "id IS NULL");
    }
}
