//! The surface the relational bridge talks to.
//!
//! A [`TableClient`] owns one store client and one [`SchemaCache`]. It is
//! shared by every caller thread; all of its operations take `&self`.
//!
//! - [`ddl`]: create table, add columns
//! - [`write`]: the write path, plus flush telemetry
//! - [`delete`]: row delete, truncate, drop

pub mod ddl;
pub mod delete;
pub mod write;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::config::Options;
use crate::error::{Error, Result};
use crate::rowkey::data_key;
use crate::scan::ScanStrategy;
use crate::schema::{SchemaCache, TableInfo};
use crate::store::{KvStore, RowScanner, ScanRequest};
use crate::types::{Cells, RowId};

/// Flush telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub flush_count: u64,
    pub last_flush_time: Duration,
    pub total_flush_time: Duration,
}

impl Stats {
    pub fn average_flush_time(&self) -> Duration {
        if self.flush_count == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_flush_time.as_secs_f64() / self.flush_count as f64)
    }
}

#[derive(Default)]
struct FlushTelemetry {
    pending_bytes: u64,
    stats: Stats,
}

/// Maps tables, columns and rows onto a [`KvStore`].
pub struct TableClient {
    store: Arc<dyn KvStore>,
    schema: SchemaCache,
    write_buffer_size: AtomicU64,
    scan_cache_rows: AtomicUsize,
    telemetry: Mutex<FlushTelemetry>,
    /// Serializes create/add/drop within this process.
    ddl_lock: Mutex<()>,
}

impl TableClient {
    /// Connect to `store` and apply `options`.
    ///
    /// Fails with `StorageConnectivity` if the store cannot be reached;
    /// no client exists after a failed connection.
    pub fn connect(store: Arc<dyn KvStore>, options: Options) -> Result<Self> {
        store.check_connection().map_err(|err| match err {
            Error::StorageConnectivity(_) => err,
            other => Error::StorageConnectivity(other.to_string()),
        })?;

        store.set_write_buffer_size(options.write_buffer_size);
        store.set_auto_flush(options.auto_flush);
        info!(
            write_buffer_size = options.write_buffer_size,
            auto_flush = options.auto_flush,
            scan_cache_rows = options.scan_cache_rows,
            "table client connected"
        );

        Ok(TableClient {
            store,
            schema: SchemaCache::new(),
            write_buffer_size: AtomicU64::new(options.write_buffer_size),
            scan_cache_rows: AtomicUsize::new(options.scan_cache_rows),
            telemetry: Mutex::new(FlushTelemetry::default()),
            ddl_lock: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    /// Resolve a table through the schema cache.
    pub fn table_info(&self, table: &str) -> Result<Arc<TableInfo>> {
        self.schema
            .resolve(self.store.as_ref(), table)
            .map_err(read_failure)
    }

    /// Cells of the DATA row for `row_id`, or `None` if it does not exist.
    pub fn get_data_row(&self, row_id: RowId, table: &str) -> Result<Option<Cells>> {
        let info = self.table_info(table)?;
        self.store
            .get(&data_key(info.id(), row_id))
            .map_err(read_failure)
    }

    /// Column name → value for a DATA row's cells.
    ///
    /// The all-null sentinel row parses to an empty map. Null columns have
    /// no cell and are absent from the result.
    pub fn parse_row(&self, cells: &Cells, table: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        let info = self.table_info(table)?;
        let mut columns = BTreeMap::new();

        if cells.len() == 1 && cells.contains_key(b"".as_slice()) {
            return Ok(columns);
        }

        for (qualifier, value) in cells {
            let bytes: [u8; 8] = qualifier.as_slice().try_into().map_err(|_| {
                Error::malformed(
                    "DATA",
                    format!("column qualifier holds {} bytes, expected 8", qualifier.len()),
                )
            })?;
            let column_id = u64::from_be_bytes(bytes);
            let name = info.column_name(column_id).ok_or(Error::UnknownColumnId {
                table_id: info.id(),
                column_id,
            })?;
            columns.insert(name.to_string(), value.clone());
        }

        Ok(columns)
    }

    /// Resolve the strategy's table, build its scan and run it.
    pub fn get_scanner(&self, strategy: &dyn ScanStrategy) -> Result<RowScanner> {
        let info = self.table_info(strategy.table_name())?;
        let request = self.with_caching(strategy.build_scan(&info)?);
        self.store.scan(request).map_err(read_failure)
    }

    /// Rows fetched per scan round trip.
    pub fn set_cache_size(&self, rows: usize) {
        self.scan_cache_rows.store(rows, Ordering::Relaxed);
        info!(rows, "set scan row cache");
    }

    pub fn set_write_buffer_size(&self, bytes: u64) {
        self.store.set_write_buffer_size(bytes);
        self.write_buffer_size.store(bytes, Ordering::Relaxed);
        info!(bytes, megabytes = bytes / 1024 / 1024, "set write buffer size");
    }

    pub fn set_auto_flush(&self, enabled: bool) {
        self.store.set_auto_flush(enabled);
        if enabled {
            info!("changes will be written to the store immediately");
        } else {
            info!("changes will be written to the store when the write buffer fills");
        }
    }

    /// Send any buffered writes to the store.
    pub fn flush_writes(&self) -> Result<()> {
        self.store.flush().map_err(write_failure)
    }

    pub fn stats(&self) -> Stats {
        self.telemetry.lock().stats
    }

    fn with_caching(&self, mut request: ScanRequest) -> ScanRequest {
        request.caching = self.scan_cache_rows.load(Ordering::Relaxed);
        request
    }
}

/// Store failures on the write side surface as `StorageWrite`, unless the
/// store was unreachable.
pub(crate) fn write_failure(err: Error) -> Error {
    match err {
        Error::StorageRead(msg) => Error::StorageWrite(msg),
        other => other,
    }
}

/// Store failures on the read side surface as `StorageRead`, unless the
/// store was unreachable.
pub(crate) fn read_failure(err: Error) -> Error {
    match err {
        Error::StorageWrite(msg) => Error::StorageRead(msg),
        other => other,
    }
}
