use tracing::{debug, info};

use crate::client::{TableClient, read_failure, write_failure};
use crate::error::Result;
use crate::rowkey::{
    INDEX_FAMILIES, ROW_INDEX_FAMILIES, RowFamily, column_info_key, data_key, root_key, table_prefix,
};
use crate::schema::TableInfo;
use crate::store::{Delete, RowFilter, ScanRequest};
use crate::types::{RowId, TableId};

impl TableClient {
    /// Delete one row and the index entries that end in its row id.
    ///
    /// Returns `false` without touching the store when `row_id` is `None`.
    ///
    /// SECONDARY_INDEX and REVERSE_INDEX keys carry no row id, so their
    /// entries for this row's values are left in place and may outlive it.
    pub fn delete_row(&self, table: &str, row_id: Option<RowId>) -> Result<bool> {
        let Some(row_id) = row_id else {
            return Ok(false);
        };

        let info = self.table_info(table)?;
        let table_id = info.id();
        self.store.flush().map_err(write_failure)?;

        let mut deletes = vec![Delete::row(data_key(table_id, row_id))];
        for family in ROW_INDEX_FAMILIES {
            let prefix = table_prefix(family, table_id);
            let filter = RowFilter::All(vec![
                RowFilter::KeyPrefix(prefix.clone()),
                RowFilter::KeySuffix(row_id.as_bytes().to_vec()),
            ]);
            let request = self.with_caching(ScanRequest::prefix(&prefix).with_filter(filter));
            for row in self.store.scan(request).map_err(read_failure)? {
                deletes.push(Delete::row(row.map_err(read_failure)?.key));
            }
        }

        debug!(table, %row_id, keys = deletes.len(), "deleting row");
        self.store.delete_batch(deletes).map_err(write_failure)?;
        Ok(true)
    }

    /// Remove every row family of the table and its ROOT entry, then evict
    /// it from the schema cache.
    ///
    /// Ids are not reclaimed: re-creating the table gets a new, higher id.
    pub fn drop_table(&self, table: &str) -> Result<bool> {
        let _ddl = self.ddl_lock.lock();
        info!(table, "preparing to drop table");

        let info = self.table_info(table)?;
        let table_id = info.id();
        self.store.flush().map_err(write_failure)?;

        self.delete_index_rows(table_id)?;
        self.delete_data_rows(table_id)?;
        self.delete_column_info_rows(&info)?;
        self.delete_columns(table_id)?;
        self.delete_table_from_root(table)?;
        self.schema.invalidate(table);

        info!(table, table_id, "dropped table");
        Ok(true)
    }

    /// Truncate: remove every index and DATA row but keep the schema.
    ///
    /// Returns the number of DATA rows removed.
    pub fn delete_all_rows(&self, table: &str) -> Result<u64> {
        let info = self.table_info(table)?;
        let table_id = info.id();
        self.store.flush().map_err(write_failure)?;

        info!(table, table_id, "deleting all rows");
        self.delete_index_rows(table_id)?;
        self.delete_data_rows(table_id)
    }

    /// Delete every row whose key starts with `prefix`; returns how many.
    pub fn delete_rows_with_prefix(&self, prefix: &[u8]) -> Result<u64> {
        let request = self.with_caching(ScanRequest::prefix(prefix));
        let mut deletes = Vec::new();
        for row in self.store.scan(request).map_err(read_failure)? {
            deletes.push(Delete::row(row.map_err(read_failure)?.key));
        }

        let count = deletes.len() as u64;
        if count > 0 {
            self.store.delete_batch(deletes).map_err(write_failure)?;
        }
        Ok(count)
    }

    fn delete_index_rows(&self, table_id: TableId) -> Result<u64> {
        let mut affected = 0;
        for family in INDEX_FAMILIES {
            affected += self.delete_rows_with_prefix(&table_prefix(family, table_id))?;
        }
        debug!(table_id, affected, "deleted index rows");
        Ok(affected)
    }

    fn delete_data_rows(&self, table_id: TableId) -> Result<u64> {
        let affected = self.delete_rows_with_prefix(&table_prefix(RowFamily::Data, table_id))?;
        debug!(table_id, affected, "deleted data rows");
        Ok(affected)
    }

    fn delete_column_info_rows(&self, info: &TableInfo) -> Result<u64> {
        let mut affected = 0;
        for column_id in info.column_ids() {
            affected += self.delete_rows_with_prefix(&column_info_key(info.id(), column_id))?;
        }
        debug!(table_id = info.id(), affected, "deleted column metadata rows");
        Ok(affected)
    }

    /// Removes the COLUMNS row, id counter included.
    fn delete_columns(&self, table_id: TableId) -> Result<u64> {
        self.delete_rows_with_prefix(&table_prefix(RowFamily::Columns, table_id))
    }

    fn delete_table_from_root(&self, table: &str) -> Result<()> {
        let delete = Delete::cells(root_key(), vec![table.as_bytes().to_vec()]);
        self.store.delete_batch(vec![delete]).map_err(write_failure)
    }
}
