use thiserror::Error;

use crate::types::{ColumnId, TableId};

/// Unified error type for the table adapter.
#[derive(Debug, Error)]
pub enum Error {
    /// ROOT has no entry for the table name.
    #[error("table not found: {name}")]
    TableNotFound { name: String },

    /// ROOT already maps the table name to an id.
    #[error("table already exists: {name}")]
    TableExists { name: String },

    /// Table and column names share the qualifier space with the empty
    /// counter qualifier.
    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },

    /// A write referenced a column the table does not have.
    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// An added column collides with an existing one.
    #[error("column '{column}' already exists in table '{table}'")]
    ColumnExists { table: String, column: String },

    /// A data row carries a column id the table never allocated.
    #[error("column id {column_id} is not mapped in table {table_id}")]
    UnknownColumnId { table_id: TableId, column_id: ColumnId },

    /// A row key does not match its family's layout.
    #[error("malformed {family} key: {reason}")]
    MalformedKey { family: &'static str, reason: String },

    /// A column value cannot be encoded for its column type.
    #[error("invalid {column_type} value: {reason}")]
    InvalidValue { column_type: &'static str, reason: String },

    /// The underlying store cannot be reached.
    #[error("storage unreachable: {0}")]
    StorageConnectivity(String),

    /// A batched put, delete or increment failed.
    #[error("storage write failed: {0}")]
    StorageWrite(String),

    /// A get or scan failed.
    #[error("storage read failed: {0}")]
    StorageRead(String),
}

impl Error {
    pub(crate) fn malformed(family: &'static str, reason: impl Into<String>) -> Self {
        Error::MalformedKey {
            family,
            reason: reason.into(),
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
