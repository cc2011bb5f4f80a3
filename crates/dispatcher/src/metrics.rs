//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single sink, accumulated across cycles
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Successful writes
    write_count: AtomicU64,
    /// Writes that returned an error (or panicked)
    failure_count: AtomicU64,
    /// Writes abandoned at the sink's deadline
    timeout_count: AtomicU64,
    /// Writes abandoned because the context was cancelled
    canceled_count: AtomicU64,
    /// Records handed to successful writes
    records_delivered: AtomicU64,
    /// Slow-write advisories emitted
    advisory_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total write count
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Record a successful write of `records` records
    pub fn record_write(&self, records: usize) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.records_delivered
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get timeout count
    pub fn timeout_count(&self) -> u64 {
        self.timeout_count.load(Ordering::Relaxed)
    }

    /// Increment timeout count
    pub fn inc_timeout_count(&self) {
        self.timeout_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get canceled count
    pub fn canceled_count(&self) -> u64 {
        self.canceled_count.load(Ordering::Relaxed)
    }

    /// Increment canceled count
    pub fn inc_canceled_count(&self) {
        self.canceled_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get delivered record count
    pub fn records_delivered(&self) -> u64 {
        self.records_delivered.load(Ordering::Relaxed)
    }

    /// Get advisory count
    pub fn advisory_count(&self) -> u64 {
        self.advisory_count.load(Ordering::Relaxed)
    }

    /// Increment advisory count
    pub fn inc_advisory_count(&self) {
        self.advisory_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            timeout_count: self.timeout_count(),
            canceled_count: self.canceled_count(),
            records_delivered: self.records_delivered(),
            advisory_count: self.advisory_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub write_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
    pub canceled_count: u64,
    pub records_delivered: u64,
    pub advisory_count: u64,
}
