//! Pivot stage: reshape timestamped snapshot files into per-course files.
//!
//! Snapshots are processed strictly sequentially in chronological order.
//! Each row lands in `intermediates/<courseCode>.csv` with one appended
//! column, the snapshot's capture instant in epoch milliseconds. Later
//! snapshots append to the same files, so the intermediate row order is the
//! chronological order the reduce stage depends on.

use crate::config::LayoutConfig;
use crate::model::columns;
use crate::snapshot::Snapshot;
use crate::stats::Metrics;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// Delete the intermediates and products trees from a previous run.
///
/// Every run starts from a clean slate; there is no resume logic to preserve
/// partial state for.
pub fn clean_working_dirs(root: &Path, layout: &LayoutConfig) -> Result<()> {
    for dir in [&layout.intermediates_dir, &layout.products_dir] {
        let path = root.join(dir);
        match fs::remove_dir_all(&path) {
            Ok(()) => tracing::debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
    Ok(())
}

/// Pivot all snapshots into per-course intermediate files under
/// `intermediates_dir`.
///
/// A failure on one snapshot file is logged and counted; the remaining
/// snapshots are still processed.
pub fn run_pivot(
    snapshots: &[Snapshot],
    intermediates_dir: &Path,
    metrics: &Metrics,
) -> Result<()> {
    fs::create_dir_all(intermediates_dir)
        .with_context(|| format!("creating {}", intermediates_dir.display()))?;

    for snapshot in snapshots {
        tracing::info!("Creating intermediates: {}", snapshot.path.display());
        match pivot_snapshot(snapshot, intermediates_dir, metrics) {
            Ok(()) => metrics.add_snapshot_processed(),
            Err(e) => {
                tracing::error!("Failed to pivot {}: {:#}", snapshot.path.display(), e);
                metrics.add_failure();
            }
        }
    }

    Ok(())
}

/// Pivot one snapshot file.
///
/// Per-course writers stay open for the duration of this snapshot and are
/// flushed when it is done, instead of the original's open/close per row.
/// Append mode keeps the cross-snapshot chronological order intact.
fn pivot_snapshot(snapshot: &Snapshot, intermediates_dir: &Path, metrics: &Metrics) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(&snapshot.path)
        .with_context(|| format!("opening {}", snapshot.path.display()))?;

    let timestamp = snapshot.timestamp_ms.to_string();
    let mut writers: HashMap<String, csv::Writer<File>> = HashMap::new();

    for result in reader.records() {
        let record = result.with_context(|| format!("reading {}", snapshot.path.display()))?;

        if record.len() < columns::SNAPSHOT_WIDTH {
            tracing::warn!(
                "Skipping short row ({} columns) in {}",
                record.len(),
                snapshot.path.display()
            );
            metrics.add_row_skipped();
            continue;
        }
        let code = match record.get(columns::CODE) {
            Some(code) if !code.is_empty() => code,
            _ => {
                tracing::warn!("Skipping row without course code in {}", snapshot.path.display());
                metrics.add_row_skipped();
                continue;
            }
        };

        let writer = match writers.entry(code.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let path = intermediates_dir.join(format!("{code}.csv"));
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening {}", path.display()))?;
                entry.insert(csv::Writer::from_writer(file))
            }
        };

        let mut out = csv::StringRecord::new();
        for field in record.iter() {
            out.push_field(field);
        }
        out.push_field(&timestamp);
        writer.write_record(&out)?;
        metrics.add_row_pivoted();
    }

    for (code, mut writer) in writers {
        writer
            .flush()
            .with_context(|| format!("flushing intermediate for {code}"))?;
    }

    Ok(())
}
