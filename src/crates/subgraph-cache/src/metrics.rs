//! Cache counters

use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot of registry activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    /// Lookups that returned a stored value
    pub hits: usize,

    /// Lookups that found nothing
    pub misses: usize,

    /// Values written
    pub writes: usize,

    /// Compressed bytes written
    pub bytes_written: usize,

    /// Namespaces cleared because their fingerprint changed
    pub invalidations: usize,

    /// Namespaces removed after their expiry passed
    pub expired_namespaces: usize,
}

impl CacheMetrics {
    /// Calculate hit ratio
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    hits: AtomicUsize,
    misses: AtomicUsize,
    writes: AtomicUsize,
    bytes_written: AtomicUsize,
    invalidations: AtomicUsize,
    expired_namespaces: AtomicUsize,
}

impl MetricsRecorder {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write(&self, bytes: usize) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn expired(&self, count: usize) {
        self.expired_namespaces.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            expired_namespaces: self.expired_namespaces.load(Ordering::Relaxed),
        }
    }
}
