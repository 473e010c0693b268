//! Relationships between entity types.

pub mod join_table;

pub use join_table::{JoinTable, JoinTableOptions, derived_keys, derived_name};
