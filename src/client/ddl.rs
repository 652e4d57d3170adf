use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::client::{TableClient, read_failure, write_failure};
use crate::error::{Error, Result};
use crate::rowkey::{column_info_key, columns_key, root_key};
use crate::schema::cache::lookup_table_id;
use crate::schema::{ColumnDef, IdAllocator, TableInfo};
use crate::store::Put;

impl TableClient {
    /// Register a table and its columns.
    ///
    /// Allocates a table id, then one contiguous block of column ids
    /// assigned in the order `columns` lists them, and writes the ROOT,
    /// COLUMNS and COLUMN_INFO cells as one batch.
    pub fn create_table(&self, name: &str, columns: &[ColumnDef]) -> Result<Arc<TableInfo>> {
        if name.is_empty() {
            return Err(Error::EmptyName { kind: "table" });
        }
        validate_columns(name, columns)?;

        let _ddl = self.ddl_lock.lock();
        let store = self.store.as_ref();
        if lookup_table_id(store, name).map_err(read_failure)?.is_some() {
            return Err(Error::TableExists {
                name: name.to_string(),
            });
        }

        let allocator = IdAllocator::new(store);
        let table_id = allocator.allocate_table_id(name).map_err(write_failure)?;

        let mut puts = vec![Put::new(root_key()).cell(name.as_bytes(), table_id.to_be_bytes())];
        let mut info = TableInfo::new(name, table_id);
        add_column_puts(&allocator, &mut info, columns, &mut puts)?;

        store.put_batch(puts).map_err(write_failure)?;
        store.flush().map_err(write_failure)?;
        info!(table = name, table_id, columns = columns.len(), "created table");

        Ok(self.schema.replace(info))
    }

    /// Add columns to an existing table.
    ///
    /// New ids come from one block sized to `columns`, in caller order.
    pub fn add_columns(&self, table: &str, columns: &[ColumnDef]) -> Result<Arc<TableInfo>> {
        validate_columns(table, columns)?;

        let _ddl = self.ddl_lock.lock();
        let current = self.table_info(table)?;
        if let Some(existing) = columns.iter().find(|c| current.column_id(&c.name).is_some()) {
            return Err(Error::ColumnExists {
                table: table.to_string(),
                column: existing.name.clone(),
            });
        }

        let store = self.store.as_ref();
        let allocator = IdAllocator::new(store);
        let mut info = TableInfo::clone(&current);
        let mut puts = Vec::with_capacity(columns.len() + 1);
        add_column_puts(&allocator, &mut info, columns, &mut puts)?;

        store.put_batch(puts).map_err(write_failure)?;
        store.flush().map_err(write_failure)?;
        info!(table, table_id = info.id(), added = columns.len(), "added columns");

        Ok(self.schema.replace(info))
    }
}

fn validate_columns(table: &str, columns: &[ColumnDef]) -> Result<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for column in columns {
        if column.name.is_empty() {
            return Err(Error::EmptyName { kind: "column" });
        }
        if !seen.insert(column.name.as_str()) {
            return Err(Error::ColumnExists {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }
    }
    Ok(())
}

/// Allocate ids for `columns` and queue their COLUMNS and COLUMN_INFO
/// cells. Metadata cells carry the column name; only the qualifier is
/// read back.
fn add_column_puts(
    allocator: &IdAllocator<'_>,
    info: &mut TableInfo,
    columns: &[ColumnDef],
    puts: &mut Vec<Put>,
) -> Result<()> {
    let table_id = info.id();
    let ids = allocator
        .allocate_column_ids(table_id, columns.len() as u64)
        .map_err(write_failure)?;

    let mut columns_row = Put::new(columns_key(table_id));
    for (column, column_id) in columns.iter().zip(ids) {
        columns_row = columns_row.cell(column.name.as_bytes(), column_id.to_be_bytes());

        let mut info_row = Put::new(column_info_key(table_id, column_id));
        for flag in &column.metadata {
            info_row = info_row.cell(flag.name().as_bytes(), column.name.as_bytes());
        }
        if !info_row.is_empty() {
            puts.push(info_row);
        }

        info.add_column(column.name.clone(), column_id, column.metadata.clone());
    }

    if !columns_row.is_empty() {
        puts.push(columns_row);
    }
    Ok(())
}
