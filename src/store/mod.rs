//! Contract of the sorted key-value store underneath the table layer.
//!
//! The store holds rows of cells (qualifier → value) under byte-sorted
//! row keys. Everything the table layer needs from it fits in one trait:
//! point gets, batched puts and deletes, filtered range scans, an atomic
//! counter increment, and a client-side write buffer.

pub mod memory;

use crate::error::Result;
use crate::types::Cells;

pub use memory::MemStore;

/// Fixed per-mutation overhead counted by [`Put::heap_size`].
const MUTATION_OVERHEAD: usize = 64;
/// Fixed per-cell overhead counted by [`Put::heap_size`].
const CELL_OVERHEAD: usize = 32;

/// Cells to merge into one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
    pub key: Vec<u8>,
    pub cells: Cells,
}

impl Put {
    pub fn new(key: Vec<u8>) -> Self {
        Put {
            key,
            cells: Cells::new(),
        }
    }

    /// Add a cell, replacing any earlier cell with the same qualifier.
    pub fn cell(mut self, qualifier: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.cells.insert(qualifier.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Approximate memory held by this mutation, used for write buffer
    /// accounting.
    pub fn heap_size(&self) -> usize {
        let cells: usize = self
            .cells
            .iter()
            .map(|(q, v)| CELL_OVERHEAD + q.len() + v.len())
            .sum();
        MUTATION_OVERHEAD + self.key.len() + cells
    }
}

/// Removal of a whole row or of selected cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub key: Vec<u8>,
    /// `None` deletes the row, otherwise only these qualifiers.
    pub qualifiers: Option<Vec<Vec<u8>>>,
}

impl Delete {
    pub fn row(key: Vec<u8>) -> Self {
        Delete {
            key,
            qualifiers: None,
        }
    }

    pub fn cells(key: Vec<u8>, qualifiers: Vec<Vec<u8>>) -> Self {
        Delete {
            key,
            qualifiers: Some(qualifiers),
        }
    }
}

/// Server-side row filter applied during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    /// Row key starts with these bytes.
    KeyPrefix(Vec<u8>),
    /// Row key ends with these bytes (row id match).
    KeySuffix(Vec<u8>),
    /// Every filter matches.
    All(Vec<RowFilter>),
}

impl RowFilter {
    pub fn matches(&self, key: &[u8]) -> bool {
        match self {
            RowFilter::KeyPrefix(prefix) => key.starts_with(prefix),
            RowFilter::KeySuffix(suffix) => key.ends_with(suffix),
            RowFilter::All(filters) => filters.iter().all(|f| f.matches(key)),
        }
    }
}

/// A range scan: keys in `[start, end)`, optionally filtered.
///
/// An empty `end` means "to the end of the key space".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanRequest {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
    pub filter: Option<RowFilter>,
    /// Rows the store may fetch per round trip.
    pub caching: usize,
}

impl ScanRequest {
    pub fn range(start: Vec<u8>, end: Vec<u8>) -> Self {
        ScanRequest {
            start,
            end,
            ..Default::default()
        }
    }

    /// Every key starting with `prefix`.
    pub fn prefix(prefix: &[u8]) -> Self {
        let end = crate::rowkey::prefix_successor(prefix).unwrap_or_default();
        ScanRequest {
            start: prefix.to_vec(),
            end,
            filter: Some(RowFilter::KeyPrefix(prefix.to_vec())),
            caching: 0,
        }
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn in_range(&self, key: &[u8]) -> bool {
        key >= self.start.as_slice() && (self.end.is_empty() || key < self.end.as_slice())
    }
}

/// One row returned by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRow {
    pub key: Vec<u8>,
    pub cells: Cells,
}

/// Forward-only, non-restartable sequence of scanned rows.
pub type RowScanner = Box<dyn Iterator<Item = Result<ScannedRow>> + Send>;

/// Client of the underlying sorted key-value store.
///
/// Implementations must be safe to share across caller threads.
/// `increment` must be atomic across every client of the same store;
/// id allocation relies on nothing else.
pub trait KvStore: Send + Sync {
    /// Fails with `StorageConnectivity` when the store cannot be reached.
    fn check_connection(&self) -> Result<()>;

    /// Cells of the row at `key`, or `None` if it has none.
    fn get(&self, key: &[u8]) -> Result<Option<Cells>>;

    /// Merge every put into its row. May be held in the write buffer.
    fn put_batch(&self, puts: Vec<Put>) -> Result<()>;

    /// Apply every delete. Never buffered.
    fn delete_batch(&self, deletes: Vec<Delete>) -> Result<()>;

    /// Atomically add `delta` to the big-endian i64 counter cell at
    /// `(key, qualifier)` (absent counts as zero); returns the new value.
    fn increment(&self, key: &[u8], qualifier: &[u8], delta: i64) -> Result<i64>;

    fn scan(&self, request: ScanRequest) -> Result<RowScanner>;

    /// Send any buffered puts.
    fn flush(&self) -> Result<()>;

    fn set_write_buffer_size(&self, bytes: u64);

    fn set_auto_flush(&self, enabled: bool);
}
