use std::ops::Range;

use tracing::debug;

use crate::error::{Error, Result};
use crate::rowkey::{columns_key, root_key};
use crate::store::KvStore;
use crate::types::{ColumnId, TableId};

/// Qualifier of the counter cell on ROOT (table ids) and on each COLUMNS
/// row (column ids). Names are never empty, so it cannot collide with a
/// name → id cell.
pub const COUNTER_QUALIFIER: &[u8] = b"";

/// Issues table and column ids from atomic counter cells in the store.
///
/// Correctness rests entirely on the store's atomic increment: two
/// callers, in this process or another, can never receive the same id.
/// The name → id cells are written afterwards as ordinary puts, so a crash
/// in between leaves an unused gap, never a duplicate.
pub struct IdAllocator<'a> {
    store: &'a dyn KvStore,
}

impl<'a> IdAllocator<'a> {
    pub fn new(store: &'a dyn KvStore) -> Self {
        IdAllocator { store }
    }

    /// Next table id: the ROOT counter after incrementing it by one.
    pub fn allocate_table_id(&self, name: &str) -> Result<TableId> {
        let id = self.store.increment(&root_key(), COUNTER_QUALIFIER, 1)?;
        let id = counter_to_id(id)?;
        debug!(table = name, table_id = id, "allocated table id");
        Ok(id)
    }

    /// Reserve `count` contiguous column ids for `table_id`.
    ///
    /// One increment by `count` returns the block's upper bound; the block
    /// is `(upper - count, upper]`.
    pub fn allocate_column_ids(&self, table_id: TableId, count: u64) -> Result<Range<ColumnId>> {
        if count == 0 {
            return Ok(0..0);
        }
        let delta = i64::try_from(count)
            .map_err(|_| Error::StorageWrite(format!("cannot allocate {count} column ids at once")))?;
        let upper = counter_to_id(self.store.increment(&columns_key(table_id), COUNTER_QUALIFIER, delta)?)?;
        let start = upper
            .checked_sub(count)
            .ok_or_else(|| Error::StorageWrite(format!("column counter {upper} below block size {count}")))?;
        debug!(table_id, first = start + 1, last = upper, "allocated column ids");
        Ok(start + 1..upper + 1)
    }
}

fn counter_to_id(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::StorageWrite(format!("id counter went negative: {value}")))
}
