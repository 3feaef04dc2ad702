use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::search::processor::{LARGE_FILE_THRESHOLD, SMALL_FILE_THRESHOLD};

/// Tracks per-run scanning counters, shared by every worker
#[derive(Debug, Clone, Default)]
pub struct ScanMetrics {
    // File processing metrics
    small_files_processed: Arc<AtomicU64>,
    buffered_files_processed: Arc<AtomicU64>,
    mmap_files_processed: Arc<AtomicU64>,
    bytes_scanned: Arc<AtomicU64>,
    read_failures: Arc<AtomicU64>,

    // Line numbering
    lines_resolved: Arc<AtomicU64>,

    // Pattern cache metrics
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a file read, bucketed by the strategy its size selects
    pub fn record_file_processing(&self, size: u64) {
        if size < SMALL_FILE_THRESHOLD {
            self.small_files_processed.fetch_add(1, Ordering::Relaxed);
        } else if size >= LARGE_FILE_THRESHOLD {
            self.mmap_files_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.buffered_files_processed
                .fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_scanned.fetch_add(size, Ordering::Relaxed);
    }

    /// Records a file that could not be opened or read
    pub fn record_read_failure(&self) {
        let total = self.read_failures.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Read failures so far: {}", total);
    }

    /// Records match offsets converted to line numbers
    pub fn record_lines_resolved(&self, count: u64) {
        self.lines_resolved.fetch_add(count, Ordering::Relaxed);
    }

    /// Records a pattern cache lookup
    pub fn record_cache_operation(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            small_files: self.small_files_processed.load(Ordering::Relaxed),
            buffered_files: self.buffered_files_processed.load(Ordering::Relaxed),
            mmap_files: self.mmap_files_processed.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            lines_resolved: self.lines_resolved.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Files processed (small/buffered/mmap): {}/{}/{}\n\
             Bytes scanned: {}\n\
             Read failures: {}\n\
             Lines resolved: {}\n\
             Pattern cache hits/misses: {}/{}",
            stats.small_files,
            stats.buffered_files,
            stats.mmap_files,
            stats.bytes_scanned,
            stats.read_failures,
            stats.lines_resolved,
            stats.cache_hits,
            stats.cache_misses
        );
    }
}

/// Snapshot of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub small_files: u64,
    pub buffered_files: u64,
    pub mmap_files: u64,
    pub bytes_scanned: u64,
    pub read_failures: u64,
    pub lines_resolved: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl ScanStats {
    pub fn files_processed(&self) -> u64 {
        self.small_files + self.buffered_files + self.mmap_files
    }
}
