//! Join tables for many-to-many relationships.
//!
//! A join table between `Post` (table `posts`) and `Comment` (table
//! `comments`) is named `comments_posts`, the two table names sorted and
//! joined by `_`. Its columns are the participants' primary keys prefixed
//! with the singular table name (`post_id`, `comment_id`), which together
//! form its primary key. Rows are created through an associative entity
//! type named after both participants, `PostComment`, which is registered
//! on first use unless a type of that name already exists.

use crate::db::{Adapter, ConnectionPool, Executor};
use crate::error::DbResult;
use crate::inflector::Inflector;
use crate::models::{
    ColumnSpec, EntityType, Instance, ModelCatalog, PrimaryKeyColumn, Record, TableSchema,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Storage options for a created join table (MySQL only).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinTableOptions {
    pub engine: Option<String>,
    pub charset: Option<String>,
}

impl JoinTableOptions {
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }
}

/// Join table name for two types: their pluralized table names sorted and
/// joined by `_`. The argument order does not matter.
pub fn derived_name(a: &EntityType, b: &EntityType, inflector: &dyn Inflector) -> String {
    let mut tables = [
        inflector.pluralize(&a.table_name),
        inflector.pluralize(&b.table_name),
    ];
    tables.sort_unstable();
    tables.join("_")
}

/// Foreign key column names referencing `entity` from a join table, one per
/// primary key column: `singular(table)_column`.
pub fn derived_keys(entity: &EntityType, inflector: &dyn Inflector) -> Vec<String> {
    let singular = inflector.singularize(&entity.table_name);
    entity
        .primary_key
        .iter()
        .map(|pk| format!("{}_{}", singular, pk.name))
        .collect()
}

pub struct JoinTable<P: ConnectionPool> {
    catalog: Arc<ModelCatalog<P>>,
    source: Arc<EntityType>,
    destination: Arc<EntityType>,
    options: JoinTableOptions,
    join_class: OnceCell<Arc<EntityType>>,
}

impl<P: ConnectionPool> JoinTable<P> {
    pub fn new(
        catalog: Arc<ModelCatalog<P>>,
        source: Arc<EntityType>,
        destination: Arc<EntityType>,
        options: JoinTableOptions,
    ) -> Self {
        Self {
            catalog,
            source,
            destination,
            options,
            join_class: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &Arc<EntityType> {
        &self.source
    }

    pub fn destination(&self) -> &Arc<EntityType> {
        &self.destination
    }

    pub fn options(&self) -> &JoinTableOptions {
        &self.options
    }

    /// The adapter of the source type.
    pub fn db(&self) -> &Adapter<P> {
        self.catalog.adapter()
    }

    pub fn name(&self) -> String {
        derived_name(&self.source, &self.destination, self.catalog.inflector())
    }

    /// Foreign key columns, source keys first.
    pub fn keys(&self) -> Vec<String> {
        self.key_columns().into_iter().map(|c| c.name).collect()
    }

    fn key_columns(&self) -> Vec<PrimaryKeyColumn> {
        let inflector = self.catalog.inflector();
        [&self.source, &self.destination]
            .into_iter()
            .flat_map(|entity| {
                derived_keys(entity, inflector)
                    .into_iter()
                    .zip(&entity.primary_key)
                    .map(|(name, pk)| PrimaryKeyColumn::new(name, pk.sql_type.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// The associative entity type, registered on first use.
    ///
    /// An existing type of the same name is returned as is.
    pub async fn join_class(&self) -> Arc<EntityType> {
        self.join_class
            .get_or_init(|| async {
                let type_name = format!("{}{}", self.source.name, self.destination.name);
                let (entity, created) = self
                    .catalog
                    .get_or_register_with(&type_name, || {
                        EntityType::new(type_name.clone(), self.name())
                            .with_primary_key(self.key_columns())
                    })
                    .await;
                if !created {
                    info!(entity = %type_name, "Reusing existing join type");
                }
                entity
            })
            .await
            .clone()
    }

    /// Insert a row into the join table.
    pub async fn create(&self, attributes: Record) -> DbResult<Instance> {
        self.create_in(self.db(), attributes).await
    }

    /// Insert a row into the join table through `executor`.
    pub async fn create_in<'e, E: Executor<'e>>(
        &self,
        executor: E,
        attributes: Record,
    ) -> DbResult<Instance> {
        let join_class = self.join_class().await;
        Instance::new(join_class, attributes).save_in(executor).await
    }

    /// Whether the join table exists in the database.
    pub async fn exists(&self) -> DbResult<bool> {
        self.db().table_exists(&self.name()).await
    }

    /// The definition used to create the table.
    pub fn schema(&self) -> TableSchema {
        let columns = self.key_columns();
        let primary_key: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        columns
            .into_iter()
            .fold(TableSchema::new(self.name()), |schema, c| {
                schema.column(ColumnSpec::new(c.name, c.sql_type).not_null())
            })
            .with_primary_key(primary_key)
            .with_engine(self.options.engine.clone())
            .with_charset(self.options.charset.clone())
    }

    /// Create the table unless it exists. Returns whether it was created.
    pub async fn create_table(&self) -> DbResult<bool> {
        if self.exists().await? {
            return Ok(false);
        }
        self.db().create_table(&self.schema()).await?;
        Ok(true)
    }

    /// Drop the table if it exists, then create it (`create_table!`).
    ///
    /// Existing rows are lost.
    pub async fn recreate_table(&self) -> DbResult<bool> {
        if self.exists().await? {
            self.db().drop_table(&self.name()).await?;
        }
        self.db().create_table(&self.schema()).await?;
        Ok(true)
    }
}

impl<P: ConnectionPool> std::fmt::Debug for JoinTable<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinTable")
            .field("name", &self.name())
            .field("source", &self.source.name)
            .field("destination", &self.destination.name)
            .field("options", &self.options)
            .finish()
    }
}
