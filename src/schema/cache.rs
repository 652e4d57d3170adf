use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::rowkey::{column_info_key, columns_key, root_key};
use crate::schema::allocator::COUNTER_QUALIFIER;
use crate::schema::{ColumnMetadata, TableInfo};
use crate::store::KvStore;
use crate::types::{ColumnId, TableId};

/// Table name → resolved [`TableInfo`].
///
/// Entries are loaded lazily from the store on first use and shared as
/// `Arc`s. Two threads racing to load the same table both read the same
/// ids, and only the first insert wins, so callers always converge on one
/// `TableInfo` per name.
///
/// Every `replace` and `invalidate` bumps a generation counter. A load is
/// cached only if the generation has not moved since it started, so a
/// load that overlaps a drop can never put the dropped table back.
#[derive(Default)]
pub struct SchemaCache {
    inner: RwLock<Entries>,
}

#[derive(Default)]
struct Entries {
    tables: HashMap<String, Arc<TableInfo>>,
    generation: u64,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<TableInfo>> {
        self.inner.read().tables.get(name).cloned()
    }

    /// Cache `info` unless another entry for the name got there first;
    /// returns whichever entry is cached afterwards.
    pub fn insert_if_absent(&self, info: TableInfo) -> Arc<TableInfo> {
        let mut inner = self.inner.write();
        inner
            .tables
            .entry(info.name().to_string())
            .or_insert_with(|| Arc::new(info))
            .clone()
    }

    /// Cache `info`, replacing any existing entry.
    pub fn replace(&self, info: TableInfo) -> Arc<TableInfo> {
        let info = Arc::new(info);
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner
            .tables
            .insert(info.name().to_string(), Arc::clone(&info));
        info
    }

    /// Evict the entry for `name`. Returns whether one was cached.
    ///
    /// Loads already in flight for any table will not be cached.
    pub fn invalidate(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.tables.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().tables.is_empty()
    }

    /// Current generation; moves on every `replace` and `invalidate`.
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Cached entry for `name`, loading it from the store on a miss.
    ///
    /// Fails with `TableNotFound` when ROOT has no cell for the name. A
    /// load that raced a `replace` or `invalidate` is discarded and
    /// repeated against the store's current state.
    pub fn resolve(&self, store: &dyn KvStore, name: &str) -> Result<Arc<TableInfo>> {
        loop {
            let started = {
                let inner = self.inner.read();
                if let Some(info) = inner.tables.get(name) {
                    return Ok(Arc::clone(info));
                }
                inner.generation
            };

            let info = load_table_info(store, name)?;

            let mut inner = self.inner.write();
            if inner.generation == started {
                let cached = inner
                    .tables
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(info));
                return Ok(Arc::clone(cached));
            }
            debug!(table = name, "schema changed during load, reloading");
        }
    }
}

/// Read ROOT, COLUMNS and every COLUMN_INFO row for `name`.
pub fn load_table_info(store: &dyn KvStore, name: &str) -> Result<TableInfo> {
    let table_id = lookup_table_id(store, name)?.ok_or_else(|| Error::TableNotFound {
        name: name.to_string(),
    })?;

    let mut info = TableInfo::new(name, table_id);
    let columns = store.get(&columns_key(table_id))?.unwrap_or_default();
    for (qualifier, value) in &columns {
        if qualifier.as_slice() == COUNTER_QUALIFIER {
            continue;
        }
        let column_name = String::from_utf8(qualifier.clone()).map_err(|_| {
            Error::StorageRead(format!("column name in table {table_id} is not UTF-8"))
        })?;
        let column_id = read_id_cell(value, "column", &column_name)?;
        let metadata = load_column_metadata(store, table_id, column_id)?;
        info.add_column(column_name, column_id, metadata);
    }

    debug!(table = name, table_id, columns = info.column_count(), "loaded table info");
    Ok(info)
}

/// Table id stored in ROOT for `name`, if any.
pub fn lookup_table_id(store: &dyn KvStore, name: &str) -> Result<Option<TableId>> {
    let root = store.get(&root_key())?.unwrap_or_default();
    root.get(name.as_bytes())
        .map(|cell| read_id_cell(cell, "table", name))
        .transpose()
}

/// Flags set on a column. Qualifiers that are not known flags are
/// skipped.
pub fn load_column_metadata(
    store: &dyn KvStore,
    table_id: TableId,
    column_id: ColumnId,
) -> Result<Vec<ColumnMetadata>> {
    let cells = store
        .get(&column_info_key(table_id, column_id))?
        .unwrap_or_default();

    let mut flags = Vec::with_capacity(cells.len());
    for qualifier in cells.keys() {
        match ColumnMetadata::parse(qualifier) {
            Some(flag) => flags.push(flag),
            None => debug!(
                table_id,
                column_id,
                flag = %String::from_utf8_lossy(qualifier),
                "skipping unknown column flag"
            ),
        }
    }
    Ok(flags)
}

fn read_id_cell(cell: &[u8], kind: &str, name: &str) -> Result<u64> {
    let bytes: [u8; 8] = cell.try_into().map_err(|_| {
        Error::StorageRead(format!(
            "{kind} id cell for '{name}' holds {} bytes, expected 8",
            cell.len()
        ))
    })?;
    Ok(u64::from_be_bytes(bytes))
}
