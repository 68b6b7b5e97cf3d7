//! Add/Drop Conversion Pipeline
//!
//! Converts scraped course-enrollment snapshot CSVs into per-course JSON
//! time-series documents in two offline stages:
//!
//! - **Snapshot ordering**: discover snapshot files and order them by the
//!   timestamp encoded in their names
//! - **Pivot**: reshape "one file per time, many courses" into "one file per
//!   course, many times", tagging every row with its snapshot's instant
//! - **Reduce**: fold each per-course file into a single document holding the
//!   course's static metadata and its chronological observation list
//!
//! Data flows strictly forward: raw snapshots → `intermediates/` per-course
//! CSVs → `products/` per-course JSON documents.
//!
//! # Usage
//!
//! ```no_run
//! use addrop_pipeline::{run_pipeline, Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     run_pipeline(std::path::Path::new("data"), &config)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod model;
pub mod pivot;
pub mod reduce;
pub mod snapshot;
pub mod stats;

pub use config::Config;
pub use model::{CourseDocument, LogRecord};
pub use snapshot::{discover_snapshots, Snapshot, SnapshotScan};
pub use stats::{Metrics, MetricsSnapshot};

use anyhow::Result;
use std::path::Path;

/// Run the full conversion pipeline against a root data directory.
///
/// Wipes the intermediates and products trees, discovers and orders the
/// snapshots, pivots them into per-course files, then reduces every course
/// file into a JSON document. Returns the run's counters.
pub fn run_pipeline(root: &Path, config: &Config) -> Result<MetricsSnapshot> {
    config.validate()?;

    if !root.is_dir() {
        anyhow::bail!("Root data directory does not exist: {}", root.display());
    }

    let metrics = Metrics::new();

    tracing::info!("Starting add/drop conversion in {}", root.display());

    // Clean slate: no resume logic exists, so stale outputs only mislead
    pivot::clean_working_dirs(root, &config.layout)?;

    let exclude = [
        config.layout.intermediates_dir.as_str(),
        config.layout.products_dir.as_str(),
    ];
    let scan = snapshot::discover_snapshots(root, config.timezone.utc_offset_hours, &exclude)?;
    metrics.add_snapshots_skipped(scan.skipped.len() as u64);

    tracing::info!(
        "Discovered {} snapshots ({} excluded for unparseable names)",
        scan.snapshots.len(),
        scan.skipped.len()
    );
    if scan.snapshots.is_empty() {
        tracing::warn!("No snapshot files found under {}", root.display());
    }

    let intermediates = root.join(&config.layout.intermediates_dir);
    let products = root.join(&config.layout.products_dir);

    pivot::run_pivot(&scan.snapshots, &intermediates, &metrics)?;
    reduce::run_reduce(
        &intermediates,
        &products,
        config.processing.parallel_reduce,
        &metrics,
    )?;

    let summary = metrics.snapshot();
    tracing::info!("Pipeline complete: {}", summary);

    Ok(summary)
}

/// Initialize the Rayon thread pool used by the reduce stage.
pub fn init_rayon(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }
    Ok(())
}
