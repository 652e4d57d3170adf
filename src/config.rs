use serde::Deserialize;

/// Tuning knobs for a [`TableClient`](crate::TableClient).
///
/// Everything here is forwarded to the store client; none of it changes
/// what gets written, only when the store sees it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Buffered mutation bytes that trigger an explicit flush.
    ///
    /// Zero means every write crosses the threshold.
    pub write_buffer_size: u64,
    /// Apply puts as soon as they are issued instead of buffering them.
    pub auto_flush: bool,
    /// Row-caching hint attached to every scan request.
    pub scan_cache_rows: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            write_buffer_size: 0,
            auto_flush: true,
            scan_cache_rows: 100,
        }
    }
}

impl Options {
    pub fn write_buffer_size(mut self, bytes: u64) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    pub fn auto_flush(mut self, enabled: bool) -> Self {
        self.auto_flush = enabled;
        self
    }

    pub fn scan_cache_rows(mut self, rows: usize) -> Self {
        self.scan_cache_rows = rows;
        self
    }
}
