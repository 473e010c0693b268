//! MySQL dialect.
//!
//! Backtick identifier quoting, integer booleans, and the ORDER BY / LIMIT
//! extensions MySQL allows on UPDATE.

use super::{DatasetOptions, SqlDialect, generic};
use crate::models::{Record, TableSchema, Value};

/// MySQL/MariaDB dialect implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    pub fn new() -> Self {
        Self
    }
}

/// The syntactic shape of a field expression.
#[derive(Debug, PartialEq, Eq)]
enum FieldShape<'a> {
    /// `count(*)`, `*`, `posts.*`
    Wildcard,
    /// `max(price)`
    Function { name: &'a str, arg: &'a str },
    /// `name DESC`
    Ordered { expr: &'a str, direction: &'a str },
    Plain,
}

fn classify_field(field: &str) -> FieldShape<'_> {
    if field.ends_with('*') {
        return FieldShape::Wildcard;
    }
    if let Some(open) = field.find('(') {
        let (name, rest) = field.split_at(open);
        if rest.starts_with("(*)") {
            return FieldShape::Wildcard;
        }
        if let Some(arg) = rest[1..].strip_suffix(')')
            && !arg.contains('*')
            && !arg.contains(')')
        {
            return FieldShape::Function { name, arg };
        }
    }
    if let Some((expr, direction)) = field.rsplit_once(' ')
        && (direction == "DESC" || direction == "ASC")
    {
        return FieldShape::Ordered { expr, direction };
    }
    FieldShape::Plain
}

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    // Embedded backticks are not escaped.
    fn quote_identifier(&self, name: &str) -> String {
        format!("`{name}`")
    }

    /// Quote a field for a select or order list.
    ///
    /// A function call with an empty argument list, such as `now()`, is kept
    /// as written instead of quoting an empty identifier.
    fn field_name(&self, field: &str) -> String {
        match classify_field(field) {
            FieldShape::Wildcard => field.to_string(),
            FieldShape::Function { name, arg } if arg.is_empty() => format!("{name}()"),
            FieldShape::Function { name, arg } => {
                format!("{}({})", name, self.quote_identifier(arg))
            }
            FieldShape::Ordered { expr, direction } => {
                format!("{} {}", self.quote_identifier(expr), direction)
            }
            FieldShape::Plain => self.quote_identifier(field),
        }
    }

    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Boolean(true) => "1".to_string(),
            Value::Boolean(false) => "0".to_string(),
            // backslash is an escape character in MySQL string literals
            Value::Text(s) => generic::quote_string(&s.replace('\\', "\\\\")),
            other => generic::literal(other),
        }
    }

    fn insert_sql(&self, table: &str, values: &Record) -> String {
        if values.is_empty() {
            return format!("INSERT INTO {} () VALUES ()", self.quote_identifier(table));
        }
        generic::insert_sql(self, table, values)
    }

    fn update_sql(
        &self,
        table: &str,
        values: &Record,
        opts: &DatasetOptions,
        overrides: Option<&DatasetOptions>,
    ) -> String {
        let merged = overrides.map_or_else(|| opts.clone(), |o| opts.merge(o));
        let mut sql = generic::update_sql(self, table, values, &merged);

        if let Some(order) = merged.order.as_deref().filter(|o| !o.is_empty()) {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.field_list(order));
        }
        if let Some(limit) = merged.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }

    fn create_table_sql(&self, schema: &TableSchema) -> String {
        let mut sql = generic::create_table_sql(self, schema);
        if let Some(engine) = &schema.engine {
            sql.push_str(&format!(" ENGINE={engine}"));
        }
        if let Some(charset) = &schema.charset {
            sql.push_str(&format!(" DEFAULT CHARSET={charset}"));
        }
        sql
    }
}
