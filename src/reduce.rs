//! Reduce stage: fold each per-course intermediate file into one JSON document.
//!
//! Rows are streamed in file order, which the pivot stage already made
//! chronological; nothing here re-sorts them. Static fields come from the
//! last row, observations from every row. Course files are independent, so
//! this stage may run in parallel across files.

use crate::model::{CourseDocument, LogRecord};
use crate::stats::Metrics;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Reduce every intermediate file under `intermediates_dir` into a product
/// document under `products_dir`.
///
/// A failure on one course file is logged and counted; other courses are
/// unaffected.
pub fn run_reduce(
    intermediates_dir: &Path,
    products_dir: &Path,
    parallel: bool,
    metrics: &Metrics,
) -> Result<()> {
    fs::create_dir_all(products_dir)
        .with_context(|| format!("creating {}", products_dir.display()))?;

    let files = list_intermediates(intermediates_dir)?;

    let reduce_one = |path: &PathBuf| match reduce_course(path, products_dir) {
        Ok(Some(out)) => {
            tracing::info!("Creating product: {}", out.display());
            metrics.add_course_written();
        }
        Ok(None) => {
            tracing::debug!("No usable rows in {}, skipping", path.display());
            metrics.add_course_empty();
        }
        Err(e) => {
            tracing::error!("Failed to reduce {}: {:#}", path.display(), e);
            metrics.add_failure();
        }
    };

    if parallel {
        files.par_iter().for_each(reduce_one);
    } else {
        files.iter().for_each(reduce_one);
    }

    Ok(())
}

/// List the intermediate CSV files. The tree is flat and processing order
/// does not matter, but product names are lowercased stems: two files whose
/// stems differ only by case would race for the same output under parallel
/// reduction. The list is sorted and the first claimant of each lowercased
/// stem wins; later ones are skipped with a warning.
fn list_intermediates(intermediates_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries = fs::read_dir(intermediates_dir)
        .with_context(|| format!("reading {}", intermediates_dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("csv") {
            files.push(path);
        }
    }
    files.sort();

    let mut claimed = std::collections::HashSet::new();
    files.retain(|path| {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return true;
        };
        if claimed.insert(stem.to_lowercase()) {
            true
        } else {
            tracing::warn!(
                "Course codes collide after lowercasing, skipping {}",
                path.display()
            );
            false
        }
    });

    Ok(files)
}

/// Reduce one course file. Returns the product path, or `None` when the file
/// held no usable rows (no document is written for such courses).
fn reduce_course(path: &Path, products_dir: &Path) -> Result<Option<PathBuf>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut log_records = Vec::new();
    let mut last_row = None;

    for result in reader.records() {
        let record = result.with_context(|| format!("reading {}", path.display()))?;
        let log_record = LogRecord::from_intermediate_row(&record)
            .with_context(|| format!("row {} of {}", log_records.len() + 1, path.display()))?;
        log_records.push(log_record);
        last_row = Some(record);
    }

    let Some(last_row) = last_row else {
        return Ok(None);
    };

    let document = CourseDocument::from_last_row(&last_row, log_records)
        .with_context(|| format!("static fields of {}", path.display()))?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("non-UTF-8 file name: {}", path.display()))?;
    let out_path = products_dir.join(format!("{}.json", stem.to_lowercase()));

    let json = serde_json::to_vec(&document)?;
    fs::write(&out_path, json).with_context(|| format!("writing {}", out_path.display()))?;

    Ok(Some(out_path))
}
