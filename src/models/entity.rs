//! Entity types and instances.

use super::{Record, Value};
use crate::db::{Adapter, ConnectionPool, Executor};
use crate::dialect::SqlDialect;
use crate::error::{DbError, DbResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// A primary key column and its SQL type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKeyColumn {
    pub name: String,
    pub sql_type: String,
}

impl PrimaryKeyColumn {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// A record type mapped to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityType {
    pub name: String,
    pub table_name: String,
    /// Ordered, possibly composite.
    pub primary_key: Vec<PrimaryKeyColumn>,
}

impl EntityType {
    /// Create a type with the default primary key, `id integer`.
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            primary_key: vec![PrimaryKeyColumn::new("id", "integer")],
        }
    }

    pub fn with_primary_key(mut self, columns: Vec<PrimaryKeyColumn>) -> Self {
        self.primary_key = columns;
        self
    }

    pub fn primary_key_names(&self) -> Vec<&str> {
        self.primary_key.iter().map(|c| c.name.as_str()).collect()
    }

    /// Build a new, unsaved instance of this type.
    pub fn instance(self: &Arc<Self>, values: Record) -> Instance {
        Instance::new(Arc::clone(self), values)
    }
}

/// Refers to an entity type by name or directly.
///
/// Names may be singular or plural, `post` and `posts` both resolve to the
/// type named `Post`.
#[derive(Debug, Clone)]
pub enum EntityRef {
    Name(String),
    Type(Arc<EntityType>),
}

impl From<&str> for EntityRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Arc<EntityType>> for EntityRef {
    fn from(entity: Arc<EntityType>) -> Self {
        Self::Type(entity)
    }
}

impl From<&Arc<EntityType>> for EntityRef {
    fn from(entity: &Arc<EntityType>) -> Self {
        Self::Type(Arc::clone(entity))
    }
}

/// A row of an entity type.
#[derive(Debug, Clone)]
pub struct Instance {
    entity: Arc<EntityType>,
    values: Record,
    persisted: bool,
}

impl Instance {
    pub fn new(entity: Arc<EntityType>, values: Record) -> Self {
        Self {
            entity,
            values,
            persisted: false,
        }
    }

    pub fn entity(&self) -> &Arc<EntityType> {
        &self.entity
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Insert this instance as a new row.
    ///
    /// For a single-column primary key left unset, the server-generated id is
    /// stored on the instance.
    pub async fn save<P: ConnectionPool>(self, adapter: &Adapter<P>) -> DbResult<Self> {
        self.save_in(adapter).await
    }

    /// Insert this instance through `executor`, e.g. inside a transaction.
    pub async fn save_in<'e, E: Executor<'e>>(mut self, executor: E) -> DbResult<Self> {
        if self.persisted {
            return Err(DbError::invalid_input(format!(
                "{} instance is already saved",
                self.entity.name
            )));
        }

        let sql = executor
            .dialect()
            .insert_sql(&self.entity.table_name, &self.values);
        let id = executor.execute(sql).await?.last_insert_id;

        if let ([pk], Some(id)) = (self.entity.primary_key.as_slice(), id)
            && self.values.get(&pk.name).is_none_or(Value::is_null)
        {
            self.values.insert(pk.name.as_str(), id);
        }

        debug!(entity = %self.entity.name, id = ?id, "Instance saved");
        self.persisted = true;
        Ok(self)
    }
}
