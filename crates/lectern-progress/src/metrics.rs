//! Metrics for the progress queue.
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding binary.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `lectern_progress_buffered_total` | Counter | - | Events appended to the local queue |
//! | `lectern_retry_attempts_total` | Counter | - | Backoff retries after quota errors |
//! | `lectern_sync_runs_total` | Counter | `outcome` | Reconciler runs by outcome |
//! | `lectern_sync_events_committed_total` | Counter | - | Writes committed by the reconciler |
//! | `lectern_pending_events` | Gauge | - | Queue length seen by the last sync |
//! | `lectern_direct_writes_total` | Counter | `outcome` | Direct progress writes by outcome |

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: events appended to the local queue.
    pub const PROGRESS_BUFFERED_TOTAL: &str = "lectern_progress_buffered_total";
    /// Counter: backoff retries after quota errors.
    pub const RETRY_ATTEMPTS_TOTAL: &str = "lectern_retry_attempts_total";
    /// Counter: reconciler runs by outcome.
    pub const SYNC_RUNS_TOTAL: &str = "lectern_sync_runs_total";
    /// Counter: writes committed by the reconciler.
    pub const SYNC_EVENTS_COMMITTED_TOTAL: &str = "lectern_sync_events_committed_total";
    /// Gauge: queue length seen by the last sync.
    pub const PENDING_EVENTS: &str = "lectern_pending_events";
    /// Counter: direct progress writes by outcome.
    pub const DIRECT_WRITES_TOTAL: &str = "lectern_direct_writes_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Outcome of an operation.
    pub const OUTCOME: &str = "outcome";
}

/// High-level interface for recording progress-queue metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressMetrics;

impl ProgressMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records an event appended to the local queue.
    pub fn record_buffered(self) {
        counter!(names::PROGRESS_BUFFERED_TOTAL).increment(1);
    }

    /// Records one backoff retry.
    pub fn record_retry(self) {
        counter!(names::RETRY_ATTEMPTS_TOTAL).increment(1);
    }

    /// Records a reconciler run (`noop`, `committed`, `failed`).
    pub fn record_sync_run(self, outcome: &'static str) {
        counter!(names::SYNC_RUNS_TOTAL, labels::OUTCOME => outcome).increment(1);
    }

    /// Records the number of writes a successful sync committed.
    pub fn record_committed(self, count: usize) {
        counter!(names::SYNC_EVENTS_COMMITTED_TOTAL)
            .increment(u64::try_from(count).unwrap_or(u64::MAX));
    }

    /// Sets the pending queue length.
    #[allow(clippy::cast_precision_loss)] // queue lengths are small
    pub fn set_pending(self, count: usize) {
        gauge!(names::PENDING_EVENTS).set(count as f64);
    }

    /// Records a direct write (`committed`, `buffered`, `failed`).
    pub fn record_direct_write(self, outcome: &'static str) {
        counter!(names::DIRECT_WRITES_TOTAL, labels::OUTCOME => outcome).increment(1);
    }
}
