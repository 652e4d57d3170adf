pub mod skiplist;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{Delete, KvStore, Put, RowScanner, ScanRequest, ScannedRow};
use crate::types::Cells;

use skiplist::SkipList;

/// Rows per scan page when the request carries no caching hint.
const DEFAULT_SCAN_PAGE: usize = 100;

/// Puts held back while autoflush is off.
struct WriteBuffer {
    pending: Vec<Put>,
    pending_bytes: u64,
    capacity: u64,
    auto_flush: bool,
}

/// In-process store client backed by a skip list.
///
/// Implements the full [`KvStore`] contract, including the client-side
/// write buffer: with autoflush off, puts stay invisible to reads until the
/// buffer reaches its capacity or [`KvStore::flush`] is called.
///
/// Deleting a row, or its last cell, unlinks it from the list. Scans are
/// lazy: each page of `caching` rows is read under its own read lock, and
/// writes made between pages are visible to the rest of the scan.
pub struct MemStore {
    rows: Arc<RwLock<SkipList>>,
    buffer: Mutex<WriteBuffer>,
    offline: AtomicBool,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore {
            rows: Arc::new(RwLock::new(SkipList::new())),
            buffer: Mutex::new(WriteBuffer {
                pending: Vec::new(),
                pending_bytes: 0,
                capacity: 0,
                auto_flush: true,
            }),
            offline: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with `StorageConnectivity`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Rows that currently have at least one cell.
    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    /// Puts waiting in the write buffer.
    pub fn buffered_puts(&self) -> usize {
        self.buffer.lock().pending.len()
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::StorageConnectivity("in-memory store is offline".into()));
        }
        Ok(())
    }

    fn apply_puts(&self, puts: Vec<Put>) {
        let mut rows = self.rows.write();
        for put in puts {
            if put.cells.is_empty() {
                continue;
            }
            let mut cells = rows.get(&put.key).cloned().unwrap_or_default();
            cells.extend(put.cells);
            rows.insert(put.key, cells);
        }
    }

    fn drain_buffer(&self, buffer: &mut WriteBuffer) {
        if buffer.pending.is_empty() {
            return;
        }
        let puts = std::mem::take(&mut buffer.pending);
        debug!(puts = puts.len(), bytes = buffer.pending_bytes, "flushing write buffer");
        buffer.pending_bytes = 0;
        self.apply_puts(puts);
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemStore {
    fn check_connection(&self) -> Result<()> {
        self.ensure_online()
    }

    fn get(&self, key: &[u8]) -> Result<Option<Cells>> {
        self.ensure_online()?;
        let rows = self.rows.read();
        Ok(rows.get(key).filter(|cells| !cells.is_empty()).cloned())
    }

    fn put_batch(&self, puts: Vec<Put>) -> Result<()> {
        self.ensure_online()?;
        let mut buffer = self.buffer.lock();
        if buffer.auto_flush {
            self.apply_puts(puts);
            return Ok(());
        }

        buffer.pending_bytes += puts.iter().map(|p| p.heap_size() as u64).sum::<u64>();
        buffer.pending.extend(puts);
        if buffer.pending_bytes >= buffer.capacity {
            self.drain_buffer(&mut buffer);
        }
        Ok(())
    }

    fn delete_batch(&self, deletes: Vec<Delete>) -> Result<()> {
        self.ensure_online()?;
        // Buffered puts were issued first and must land first.
        self.drain_buffer(&mut self.buffer.lock());

        let mut rows = self.rows.write();
        for delete in deletes {
            let Some(qualifiers) = delete.qualifiers else {
                rows.remove(&delete.key);
                continue;
            };
            let Some(existing) = rows.get(&delete.key) else {
                continue;
            };
            let mut cells = existing.clone();
            for qualifier in &qualifiers {
                cells.remove(qualifier);
            }
            if cells.is_empty() {
                rows.remove(&delete.key);
            } else {
                rows.insert(delete.key, cells);
            }
        }
        Ok(())
    }

    fn increment(&self, key: &[u8], qualifier: &[u8], delta: i64) -> Result<i64> {
        self.ensure_online()?;
        let mut rows = self.rows.write();
        let mut cells = rows.get(key).cloned().unwrap_or_default();

        let current = match cells.get(qualifier) {
            None => 0,
            Some(raw) => {
                let bytes: [u8; 8] = raw.as_slice().try_into().map_err(|_| {
                    Error::StorageWrite(format!("counter cell holds {} bytes, expected 8", raw.len()))
                })?;
                i64::from_be_bytes(bytes)
            }
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| Error::StorageWrite(format!("counter overflow adding {delta} to {current}")))?;

        cells.insert(qualifier.to_vec(), next.to_be_bytes().to_vec());
        rows.insert(key.to_vec(), cells);
        Ok(next)
    }

    fn scan(&self, request: ScanRequest) -> Result<RowScanner> {
        self.ensure_online()?;
        Ok(Box::new(MemScanner::new(Arc::clone(&self.rows), request)))
    }

    fn flush(&self) -> Result<()> {
        self.ensure_online()?;
        self.drain_buffer(&mut self.buffer.lock());
        Ok(())
    }

    fn set_write_buffer_size(&self, bytes: u64) {
        self.buffer.lock().capacity = bytes;
    }

    fn set_auto_flush(&self, enabled: bool) {
        let mut buffer = self.buffer.lock();
        buffer.auto_flush = enabled;
        if enabled {
            self.drain_buffer(&mut buffer);
        }
    }
}

/// Lazy scan over a [`MemStore`], fetched one page at a time.
///
/// Each page re-seeks from the successor of the last key visited, so rows
/// inserted or removed between pages are handled like any other
/// concurrent write: no snapshot, no skipped or repeated keys.
struct MemScanner {
    rows: Arc<RwLock<SkipList>>,
    request: ScanRequest,
    page_size: usize,
    /// Inclusive start of the next page; `None` once the range is done.
    resume: Option<Vec<u8>>,
    page: VecDeque<ScannedRow>,
}

impl MemScanner {
    fn new(rows: Arc<RwLock<SkipList>>, request: ScanRequest) -> Self {
        let page_size = if request.caching == 0 {
            DEFAULT_SCAN_PAGE
        } else {
            request.caching
        };
        MemScanner {
            rows,
            resume: Some(request.start.clone()),
            request,
            page_size,
            page: VecDeque::new(),
        }
    }

    fn fill_page(&mut self) {
        let Some(start) = self.resume.take() else {
            return;
        };
        let rows = self.rows.read();
        let mut iter = rows.iter();
        iter.seek(&start);

        while iter.is_valid() && self.request.in_range(iter.key()) {
            let key = iter.key();
            if let Some(cells) = iter.cells().filter(|c| !c.is_empty()) {
                if self.request.filter.as_ref().is_none_or(|f| f.matches(key)) {
                    self.page.push_back(ScannedRow {
                        key: key.to_vec(),
                        cells: cells.clone(),
                    });
                }
            }
            iter.next();
            if self.page.len() >= self.page_size {
                // Smallest key after the one just visited
                let mut next = key.to_vec();
                next.push(0);
                self.resume = Some(next);
                break;
            }
        }
    }
}

impl Iterator for MemScanner {
    type Item = Result<ScannedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.page.is_empty() && self.resume.is_some() {
            self.fill_page();
        }
        self.page.pop_front().map(Ok)
    }
}
