//! Data models.
//!
//! This module re-exports all model types used throughout the crate.

pub mod catalog;
pub mod entity;
pub mod record;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use catalog::ModelCatalog;
pub use entity::{EntityRef, EntityType, Instance, PrimaryKeyColumn};
pub use record::Record;
pub use schema::{ColumnSpec, TableSchema};
pub use value::Value;
