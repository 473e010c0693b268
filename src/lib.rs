//! relmap: the relational-mapping core of a MySQL ORM.
//!
//! - [`db::Adapter`] executes SQL over a connection pool, decodes rows into
//!   typed [`models::Record`]s and runs re-entrant transactions.
//! - [`dialect`] renders MySQL SQL text.
//! - [`relationships::JoinTable`] derives, creates and populates the join
//!   tables of many-to-many relationships.

pub mod config;
pub mod dataset;
pub mod db;
pub mod dialect;
pub mod error;
pub mod inflector;
pub mod models;
pub mod relationships;

pub use config::{Config, DatabaseConfig};
pub use dataset::Dataset;
pub use db::{Adapter, Transaction};
pub use error::{DbError, DbResult};
pub use inflector::{EnglishInflector, Inflector};
pub use models::{EntityType, ModelCatalog, Record, Value};
pub use relationships::{JoinTable, JoinTableOptions};
