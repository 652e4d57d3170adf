//! Table and column metadata.
//!
//! A table's schema lives in three places in the store: its id in a ROOT
//! cell keyed by name, its column ids in the COLUMNS row keyed by column
//! name, and each column's flags as qualifiers on a COLUMN_INFO row.
//! [`TableInfo`] is the in-memory assembly of all three.

pub mod allocator;
pub mod cache;

use std::collections::{BTreeMap, HashMap};

use crate::rowkey::SortOrder;
use crate::rowkey::value::ColumnType;
use crate::types::{ColumnId, TableId};

pub use allocator::IdAllocator;
pub use cache::SchemaCache;

/// A flag attached to a column. Presence of the qualifier on the
/// COLUMN_INFO row means the flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnMetadata {
    IsNullable,
    PrimaryKey,
    /// Ordered index rows for this column use the descending layout.
    Descending,
    String,
    Binary,
    Long,
    ULong,
    Double,
    Decimal,
    Date,
    Time,
    DateTime,
}

impl ColumnMetadata {
    pub const ALL: [ColumnMetadata; 12] = [
        ColumnMetadata::IsNullable,
        ColumnMetadata::PrimaryKey,
        ColumnMetadata::Descending,
        ColumnMetadata::String,
        ColumnMetadata::Binary,
        ColumnMetadata::Long,
        ColumnMetadata::ULong,
        ColumnMetadata::Double,
        ColumnMetadata::Decimal,
        ColumnMetadata::Date,
        ColumnMetadata::Time,
        ColumnMetadata::DateTime,
    ];

    /// Qualifier stored on the COLUMN_INFO row.
    pub fn name(self) -> &'static str {
        match self {
            ColumnMetadata::IsNullable => "IS_NULLABLE",
            ColumnMetadata::PrimaryKey => "PRIMARY_KEY",
            ColumnMetadata::Descending => "DESCENDING",
            ColumnMetadata::String => "STRING",
            ColumnMetadata::Binary => "BINARY",
            ColumnMetadata::Long => "LONG",
            ColumnMetadata::ULong => "ULONG",
            ColumnMetadata::Double => "DOUBLE",
            ColumnMetadata::Decimal => "DECIMAL",
            ColumnMetadata::Date => "DATE",
            ColumnMetadata::Time => "TIME",
            ColumnMetadata::DateTime => "DATETIME",
        }
    }

    /// Parse a stored qualifier, case-insensitively. Unknown flags yield
    /// `None` so newer writers can add flags older readers ignore.
    pub fn parse(qualifier: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(qualifier).ok()?;
        Self::ALL
            .into_iter()
            .find(|flag| flag.name().eq_ignore_ascii_case(text))
    }

    /// Column type this flag selects, if it is a type flag.
    pub fn column_type(self) -> Option<ColumnType> {
        let ty = match self {
            ColumnMetadata::String => ColumnType::String,
            ColumnMetadata::Binary => ColumnType::Binary,
            ColumnMetadata::Long => ColumnType::Long,
            ColumnMetadata::ULong => ColumnType::ULong,
            ColumnMetadata::Double => ColumnType::Double,
            ColumnMetadata::Decimal => ColumnType::Decimal,
            ColumnMetadata::Date => ColumnType::Date,
            ColumnMetadata::Time => ColumnType::Time,
            ColumnMetadata::DateTime => ColumnType::DateTime,
            ColumnMetadata::IsNullable | ColumnMetadata::PrimaryKey | ColumnMetadata::Descending => {
                return None;
            }
        };
        Some(ty)
    }
}

/// A column as supplied to `create_table` / `add_columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub metadata: Vec<ColumnMetadata>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            metadata: Vec::new(),
        }
    }

    pub fn with(mut self, flag: ColumnMetadata) -> Self {
        if !self.metadata.contains(&flag) {
            self.metadata.push(flag);
        }
        self
    }
}

/// Resolved schema of one table.
///
/// Owned by the [`SchemaCache`] and shared read-only; adding columns
/// produces a new `TableInfo` that replaces the cached one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    name: String,
    id: TableId,
    ids_by_name: HashMap<String, ColumnId>,
    names_by_id: BTreeMap<ColumnId, String>,
    metadata: HashMap<ColumnId, Vec<ColumnMetadata>>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, id: TableId) -> Self {
        TableInfo {
            name: name.into(),
            id,
            ids_by_name: HashMap::new(),
            names_by_id: BTreeMap::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    /// Register a column. Flags are kept in declaration order of
    /// [`ColumnMetadata`], whatever order they were supplied or stored in.
    pub fn add_column(&mut self, name: impl Into<String>, id: ColumnId, mut metadata: Vec<ColumnMetadata>) {
        metadata.sort_unstable();
        metadata.dedup();
        let name = name.into();
        self.ids_by_name.insert(name.clone(), id);
        self.names_by_id.insert(id, name);
        self.metadata.insert(id, metadata);
    }

    pub fn column_id(&self, name: &str) -> Option<ColumnId> {
        self.ids_by_name.get(name).copied()
    }

    pub fn column_name(&self, id: ColumnId) -> Option<&str> {
        self.names_by_id.get(&id).map(String::as_str)
    }

    pub fn metadata(&self, id: ColumnId) -> &[ColumnMetadata] {
        self.metadata.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_flag(&self, id: ColumnId, flag: ColumnMetadata) -> bool {
        self.metadata(id).contains(&flag)
    }

    /// First type flag on the column; `BINARY` when there is none.
    pub fn column_type(&self, id: ColumnId) -> ColumnType {
        self.metadata(id)
            .iter()
            .find_map(|flag| flag.column_type())
            .unwrap_or_default()
    }

    pub fn sort_order(&self, id: ColumnId) -> SortOrder {
        if self.has_flag(id, ColumnMetadata::Descending) {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }

    /// Column ids in ascending order.
    pub fn column_ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.names_by_id.keys().copied()
    }

    pub fn column_count(&self) -> usize {
        self.names_by_id.len()
    }
}
