//! Run statistics collection.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters for one pipeline run.
///
/// Shared across the rayon reduce workers, so everything is atomic.
#[derive(Debug)]
pub struct Metrics {
    /// Snapshot files pivoted
    pub snapshots_processed: AtomicU64,

    /// CSV files excluded for an unparseable file-name timestamp
    pub snapshots_skipped: AtomicU64,

    /// Rows appended to intermediate files
    pub rows_pivoted: AtomicU64,

    /// Rows dropped for a missing course code or short column count
    pub rows_skipped: AtomicU64,

    /// Course documents written
    pub courses_written: AtomicU64,

    /// Intermediate files with zero usable rows (no document written)
    pub courses_empty: AtomicU64,

    /// Failed file operations (the run continues past these)
    pub failures: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            snapshots_processed: AtomicU64::new(0),
            snapshots_skipped: AtomicU64::new(0),
            rows_pivoted: AtomicU64::new(0),
            rows_skipped: AtomicU64::new(0),
            courses_written: AtomicU64::new(0),
            courses_empty: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            start_time: Instant::now(),
        })
    }

    pub fn add_snapshot_processed(&self) {
        self.snapshots_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_snapshots_skipped(&self, count: u64) {
        self.snapshots_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_row_pivoted(&self) {
        self.rows_pivoted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_row_skipped(&self) {
        self.rows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_course_written(&self) {
        self.courses_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_course_empty(&self) {
        self.courses_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Elapsed time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let elapsed = self.elapsed();
        let rows_pivoted = self.rows_pivoted.load(Ordering::Relaxed);
        let rows_per_second = if elapsed.as_secs_f64() > 0.0 {
            rows_pivoted as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        MetricsSnapshot {
            snapshots_processed: self.snapshots_processed.load(Ordering::Relaxed),
            snapshots_skipped: self.snapshots_skipped.load(Ordering::Relaxed),
            rows_pivoted,
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
            courses_written: self.courses_written.load(Ordering::Relaxed),
            courses_empty: self.courses_empty.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            elapsed_secs: elapsed.as_secs_f64(),
            rows_per_second,
        }
    }
}

/// Snapshot of run counters at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub snapshots_processed: u64,
    pub snapshots_skipped: u64,
    pub rows_pivoted: u64,
    pub rows_skipped: u64,
    pub courses_written: u64,
    pub courses_empty: u64,
    pub failures: u64,
    pub elapsed_secs: f64,
    pub rows_per_second: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Snapshots: {} processed, {} skipped | Rows: {} pivoted, {} skipped | \
             Courses: {} written, {} empty | Failures: {} | \
             Elapsed: {:.1}s ({:.0} rows/s)",
            self.snapshots_processed,
            self.snapshots_skipped,
            self.rows_pivoted,
            self.rows_skipped,
            self.courses_written,
            self.courses_empty,
            self.failures,
            self.elapsed_secs,
            self.rows_per_second,
        )
    }
}
