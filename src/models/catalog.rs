//! Registry of entity types bound to one adapter.
//!
//! Types are registered under their name and looked up the way a caller
//! names them in relationships: `post`, `posts` and `Post` all resolve to the
//! type named `Post`.

use super::entity::{EntityRef, EntityType};
use crate::db::{Adapter, ConnectionPool};
use crate::error::{DbError, DbResult};
use crate::inflector::{EnglishInflector, Inflector};
use crate::relationships::{JoinTable, JoinTableOptions};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub struct ModelCatalog<P: ConnectionPool> {
    adapter: Adapter<P>,
    inflector: Arc<dyn Inflector>,
    entities: RwLock<HashMap<String, Arc<EntityType>>>,
}

impl<P: ConnectionPool> ModelCatalog<P> {
    pub fn new(adapter: Adapter<P>) -> Self {
        Self::with_inflector(adapter, Arc::new(EnglishInflector))
    }

    pub fn with_inflector(adapter: Adapter<P>, inflector: Arc<dyn Inflector>) -> Self {
        Self {
            adapter,
            inflector,
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// The adapter every type in this catalog uses.
    pub fn adapter(&self) -> &Adapter<P> {
        &self.adapter
    }

    pub fn inflector(&self) -> &dyn Inflector {
        self.inflector.as_ref()
    }

    /// Register a type, replacing any previous type of the same name.
    pub async fn register(&self, entity: EntityType) -> Arc<EntityType> {
        let entity = Arc::new(entity);
        self.entities
            .write()
            .await
            .insert(entity.name.clone(), Arc::clone(&entity));
        entity
    }

    /// Register a type mapped to the default table for its name
    /// (`BlogPost` → `blog_posts`) with the default primary key.
    pub async fn define(&self, name: &str) -> Arc<EntityType> {
        let table_name = self.inflector.tableize(name);
        self.register(EntityType::new(name, table_name)).await
    }

    /// Look up a type by its exact name.
    pub async fn lookup(&self, name: &str) -> Option<Arc<EntityType>> {
        self.entities.read().await.get(name).cloned()
    }

    /// Return the type named `name`, building and registering it with `build`
    /// if absent. The check and the insert happen under one lock, so
    /// concurrent callers agree on a single type.
    ///
    /// The flag is `true` when the type was created by this call.
    pub async fn get_or_register_with<F>(&self, name: &str, build: F) -> (Arc<EntityType>, bool)
    where
        F: FnOnce() -> EntityType,
    {
        let mut entities = self.entities.write().await;
        if let Some(existing) = entities.get(name) {
            return (Arc::clone(existing), false);
        }
        let entity = Arc::new(build());
        entities.insert(name.to_string(), Arc::clone(&entity));
        info!(entity = %name, table = %entity.table_name, "Entity type registered");
        (entity, true)
    }

    /// Resolve a reference to a registered type.
    pub async fn resolve(&self, entity: &EntityRef) -> DbResult<Arc<EntityType>> {
        match entity {
            EntityRef::Type(entity) => Ok(Arc::clone(entity)),
            EntityRef::Name(name) => {
                let type_name = self.inflector.classify(name);
                self.lookup(&type_name).await.ok_or_else(|| {
                    DbError::schema(
                        format!("No entity type named '{}' is registered", type_name),
                        name.clone(),
                    )
                })
            }
        }
    }

    /// A join table between two registered types.
    pub async fn join_table(
        self: &Arc<Self>,
        source: impl Into<EntityRef>,
        destination: impl Into<EntityRef>,
        options: JoinTableOptions,
    ) -> DbResult<JoinTable<P>> {
        let source = self.resolve(&source.into()).await?;
        let destination = self.resolve(&destination.into()).await?;
        Ok(JoinTable::new(Arc::clone(self), source, destination, options))
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }
}
