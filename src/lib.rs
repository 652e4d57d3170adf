//! # Relational tables on a sorted key-value store
//!
//! Maps named tables, columns and rows onto one flat, byte-sorted key
//! space and maintains the index rows that make lookups and deletes cheap
//! on a store with no secondary indexes of its own.
//!
//! ## Core idea
//! Every piece of state is a row under a family-prefixed key (see
//! [`rowkey`]). A data row is written together with forward, secondary,
//! reverse, ordered and null index rows in one batch. There are no
//! transactions: consistency comes from key layout, atomic id counters
//! and write ordering alone.

pub mod client;
pub mod config;
pub mod error;
pub mod rowkey;
pub mod scan;
pub mod schema;
pub mod store;
pub mod types;

// Public re-exports for the top-level API
pub use client::{Stats, TableClient};
pub use config::Options;
pub use error::{Error, Result};
pub use scan::{ScanStrategy, TableScan};
pub use schema::{ColumnDef, ColumnMetadata, TableInfo};
pub use store::{KvStore, MemStore};
pub use types::{ColumnValues, RowId, Tag};
