use std::time::Instant;

use tracing::{debug, info};

use crate::client::{TableClient, write_failure};
use crate::error::{Error, Result};
use crate::rowkey::RowKey;
use crate::rowkey::value::to_sortable;
use crate::store::Put;
use crate::types::{ColumnValues, RowId, Tag};

/// Qualifier of the raw-value cell on SECONDARY_INDEX and REVERSE_INDEX
/// rows.
pub const VALUE_QUALIFIER: &[u8] = b"value";

impl TableClient {
    /// Insert one row and every index entry derived from it.
    ///
    /// For each supplied column:
    /// - null: one NULL_INDEX entry and one null ORDERED_INDEX entry,
    ///   both carrying `tag`;
    /// - non-null: a cell on the DATA row, one VALUE_INDEX and one
    ///   ORDERED_INDEX entry carrying `tag`, and one SECONDARY_INDEX and one
    ///   REVERSE_INDEX entry carrying the raw value.
    ///
    /// A row whose supplied values are all null gets the empty sentinel
    /// cell so it still exists. Everything goes to the store as one batch;
    /// nothing is issued if any column is unknown or any value does not
    /// fit its column type.
    pub fn write_row(&self, table: &str, values: &ColumnValues, tag: Option<&Tag>) -> Result<RowId> {
        let info = self.table_info(table)?;
        let table_id = info.id();
        let row_id = RowId::random();

        let (tag_name, tag_value) = match tag {
            Some(tag) => (tag.name.as_slice(), tag.value.as_slice()),
            None => (&[][..], &[][..]),
        };

        let mut data_row = Put::new(RowKey::Data { table_id, row_id }.encode());
        let mut puts = Vec::with_capacity(values.len() * 4 + 1);

        for (column, value) in values {
            let column_id = info.column_id(column).ok_or_else(|| Error::ColumnNotFound {
                table: table.to_string(),
                column: column.clone(),
            })?;
            let order = info.sort_order(column_id);

            let Some(raw) = value else {
                let null_key = RowKey::NullIndex {
                    table_id,
                    column_id,
                    row_id,
                };
                puts.push(Put::new(null_key.encode()).cell(tag_name, tag_value));

                let ordered_key = RowKey::OrderedIndex {
                    order,
                    table_id,
                    column_id,
                    value: None,
                    row_id,
                };
                puts.push(Put::new(ordered_key.encode()).cell(tag_name, tag_value));
                continue;
            };

            let sortable = to_sortable(info.column_type(column_id), raw)?;
            data_row = data_row.cell(column_id.to_be_bytes(), raw.as_slice());

            let value_key = RowKey::ValueIndex {
                table_id,
                column_id,
                value: sortable.clone(),
                row_id,
            };
            puts.push(Put::new(value_key.encode()).cell(tag_name, tag_value));

            let secondary_key = RowKey::SecondaryIndex {
                table_id,
                column_id,
                value: sortable.clone(),
            };
            puts.push(Put::new(secondary_key.encode()).cell(VALUE_QUALIFIER, raw.as_slice()));

            let reverse_key = RowKey::ReverseIndex {
                table_id,
                column_id,
                value: sortable.clone(),
            };
            puts.push(Put::new(reverse_key.encode()).cell(VALUE_QUALIFIER, raw.as_slice()));

            let ordered_key = RowKey::OrderedIndex {
                order,
                table_id,
                column_id,
                value: Some(sortable),
                row_id,
            };
            puts.push(Put::new(ordered_key.encode()).cell(tag_name, tag_value));
        }

        if data_row.is_empty() {
            // Every column was null: the empty sentinel cell keeps the row.
            data_row = data_row.cell(Vec::<u8>::new(), Vec::<u8>::new());
        }
        puts.push(data_row);

        let bytes: u64 = puts.iter().map(|p| p.heap_size() as u64).sum();
        let rows = puts.len();
        let started = Instant::now();
        self.store.put_batch(puts).map_err(write_failure)?;
        debug!(table, %row_id, rows, bytes, "wrote row");

        self.account_write(bytes, started)?;
        Ok(row_id)
    }

    /// Add `bytes` to the pending total and, once it reaches the write
    /// buffer size, flush the store and record the flush timing.
    fn account_write(&self, bytes: u64, started: Instant) -> Result<()> {
        let threshold = self.write_buffer_size.load(std::sync::atomic::Ordering::Relaxed);
        {
            let mut telemetry = self.telemetry.lock();
            telemetry.pending_bytes += bytes;
            if telemetry.pending_bytes < threshold {
                return Ok(());
            }
            telemetry.pending_bytes = 0;
        }

        self.store.flush().map_err(write_failure)?;
        let elapsed = started.elapsed();

        let stats = {
            let mut telemetry = self.telemetry.lock();
            let stats = &mut telemetry.stats;
            stats.flush_count += 1;
            stats.last_flush_time = elapsed;
            stats.total_flush_time += elapsed;
            *stats
        };
        info!(
            flush = stats.flush_count,
            elapsed_ms = elapsed.as_millis() as u64,
            average_ms = stats.average_flush_time().as_millis() as u64,
            total_ms = stats.total_flush_time.as_millis() as u64,
            "flushed writes"
        );
        Ok(())
    }
}
