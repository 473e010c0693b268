//! Database access layer.
//!
//! This module provides:
//! - Driver and pool seams (`driver`) with a sqlx MySQL implementation (`pool`)
//! - The value coercion table (`types`) and row decoding (`decoder`)
//! - Transaction management (`transaction_registry`)
//! - The [`Executor`] seam shared by the adapter and transactions (`executor`)
//! - The adapter tying them together (`adapter`)

pub mod adapter;
pub mod decoder;
pub mod driver;
pub mod executor;
pub mod pool;
pub mod transaction_registry;
pub mod types;

pub use adapter::{Adapter, SqlLog, SqlLogger};
pub use decoder::{ColumnDescriptor, RowDecoder};
pub use driver::{Connection, ConnectionPool, ExecOutcome, FieldInfo, RawRow, RowSource};
pub use executor::Executor;
pub use pool::MySqlRows;
pub use transaction_registry::{Transaction, TransactionMetadata, TransactionRegistry};
pub use types::{FieldType, coerce};
