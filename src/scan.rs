use crate::error::Result;
use crate::rowkey::{RowFamily, table_prefix};
use crate::schema::TableInfo;
use crate::store::ScanRequest;

/// Turns resolved table metadata into a store-level range scan.
///
/// The query side decides which family and range to read (an equality
/// lookup on the value index, a reverse range, a full table scan); the
/// client only resolves the table and forwards the request.
pub trait ScanStrategy {
    fn table_name(&self) -> &str;

    fn build_scan(&self, info: &TableInfo) -> Result<ScanRequest>;
}

/// Every DATA row of one table.
#[derive(Debug, Clone)]
pub struct TableScan {
    table: String,
}

impl TableScan {
    pub fn new(table: impl Into<String>) -> Self {
        TableScan {
            table: table.into(),
        }
    }
}

impl ScanStrategy for TableScan {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn build_scan(&self, info: &TableInfo) -> Result<ScanRequest> {
        Ok(ScanRequest::prefix(&table_prefix(RowFamily::Data, info.id())))
    }
}
