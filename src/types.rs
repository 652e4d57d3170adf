use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

/// Identifier of a table, allocated once from the ROOT counter.
pub type TableId = u64;

/// Identifier of a column, unique within its table.
pub type ColumnId = u64;

/// Cells of one stored row: qualifier → value, sorted by qualifier.
///
/// A row with no cells does not exist, the same way a row with every
/// cell deleted stops existing in the store.
pub type Cells = BTreeMap<Vec<u8>, Vec<u8>>;

/// Column name → value for one logical row. `None` is SQL NULL.
pub type ColumnValues = BTreeMap<String, Option<Vec<u8>>>;

/// Size of an encoded [`RowId`].
pub const ROW_ID_LEN: usize = 16;

/// Identifies one logical row within a table.
///
/// Generated randomly at insert time and never recomputed. Encodes as
/// 16 big-endian bytes at the tail of per-row keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(Uuid);

impl RowId {
    /// A fresh random (v4) row id.
    pub fn random() -> Self {
        RowId(Uuid::new_v4())
    }

    pub fn from_u128(value: u128) -> Self {
        RowId(Uuid::from_u128(value))
    }

    pub fn from_bytes(bytes: [u8; ROW_ID_LEN]) -> Self {
        RowId(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ROW_ID_LEN] {
        self.0.as_bytes()
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for RowId {
    fn from(uuid: Uuid) -> Self {
        RowId(uuid)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Optional tag/value payload the relational bridge attaches to
/// forward-index and null-index cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl Tag {
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Tag {
            name: name.into(),
            value: value.into(),
        }
    }
}
