//! Snapshot discovery and chronological ordering.
//!
//! Snapshot files are CSV captures of the full course catalog, named with a
//! leading wall-clock token like `2023-1-5_9-0-0` (year-month-day_hour-minute-second,
//! no zero padding). The token carries no UTC offset, so the configured offset
//! decides which instant it denotes.

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

static TIMESTAMP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)-(\d+)-(\d+)_(\d+)-(\d+)-(\d+)").expect("valid timestamp regex"));

/// A snapshot file with its parsed capture instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Path to the snapshot CSV file
    pub path: PathBuf,

    /// Capture instant in milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

/// Result of a discovery walk over the root data directory.
#[derive(Debug, Default)]
pub struct SnapshotScan {
    /// Snapshots sorted ascending by capture instant
    pub snapshots: Vec<Snapshot>,

    /// CSV files whose name did not yield a timestamp, excluded from processing
    pub skipped: Vec<PathBuf>,
}

impl SnapshotScan {
    /// Earliest and latest capture instants, if any snapshots were found.
    pub fn time_range_ms(&self) -> Option<(i64, i64)> {
        match (self.snapshots.first(), self.snapshots.last()) {
            (Some(first), Some(last)) => Some((first.timestamp_ms, last.timestamp_ms)),
            _ => None,
        }
    }
}

/// Parse the leading timestamp token of a snapshot file name into epoch
/// milliseconds, interpreting the wall-clock time at the given offset.
///
/// Returns `None` when the name does not start with a timestamp token or the
/// token does not denote a valid calendar time.
pub fn parse_file_name_timestamp(file_name: &str, offset: FixedOffset) -> Option<i64> {
    let caps = TIMESTAMP_RE.captures(file_name)?;

    // Six \d+ groups always fit a u32 check below; overflow parses as None
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = field(1)? as i32;
    let (month, day) = (field(2)?, field(3)?);
    let (hour, min, sec) = (field(4)?, field(5)?, field(6)?);

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, min, sec)?;

    // Ambiguous or nonexistent local times cannot occur at a fixed offset
    let instant = naive.and_local_timezone(offset).single()?;
    Some(instant.timestamp_millis())
}

/// Discover all snapshot CSV files under `root` and order them ascending by
/// capture instant.
///
/// Files under the working directories named in `exclude_dirs` (the
/// intermediates and products trees of a previous run) are ignored. CSV files
/// whose name does not parse to a timestamp are reported in
/// [`SnapshotScan::skipped`] rather than sorted with an undefined position;
/// appending rows with an undefined timestamp would corrupt the series.
pub fn discover_snapshots(
    root: &Path,
    offset_hours: i32,
    exclude_dirs: &[&str],
) -> Result<SnapshotScan> {
    let offset = FixedOffset::east_opt(offset_hours * 3600)
        .with_context(|| format!("invalid UTC offset: {offset_hours} hours"))?;

    let mut scan = SnapshotScan::default();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        // Working directories live directly under the root
        if entry.depth() == 1 && entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy();
            return !exclude_dirs.iter().any(|d| *d == name);
        }
        true
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(".csv") {
            continue;
        }

        match parse_file_name_timestamp(&name, offset) {
            Some(timestamp_ms) => scan.snapshots.push(Snapshot {
                path: entry.path().to_path_buf(),
                timestamp_ms,
            }),
            None => {
                tracing::warn!(
                    "Snapshot file name has no parseable timestamp, excluding: {}",
                    entry.path().display()
                );
                scan.skipped.push(entry.path().to_path_buf());
            }
        }
    }

    // Path as tiebreaker keeps the order deterministic when two snapshots
    // share an instant
    scan.snapshots
        .sort_by(|a, b| (a.timestamp_ms, &a.path).cmp(&(b.timestamp_ms, &b.path)));

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn hk() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_parse_timestamp_basic() {
        // 2023-01-05 09:00:00 +08:00 == 2023-01-05 01:00:00 UTC
        let ms = parse_file_name_timestamp("2023-1-5_9-0-0.csv", hk()).unwrap();
        assert_eq!(ms, 1_672_880_400_000);
    }

    #[test]
    fn test_parse_timestamp_with_suffix() {
        let plain = parse_file_name_timestamp("2023-1-5_9-0-0.csv", hk()).unwrap();
        let suffixed = parse_file_name_timestamp("2023-1-5_9-0-0_catalog-full.csv", hk()).unwrap();
        assert_eq!(plain, suffixed);
    }

    #[test]
    fn test_parse_timestamp_not_anchored() {
        assert!(parse_file_name_timestamp("backup_2023-1-5_9-0-0.csv", hk()).is_none());
        assert!(parse_file_name_timestamp("notes.csv", hk()).is_none());
        assert!(parse_file_name_timestamp("2023-1-5.csv", hk()).is_none());
    }

    #[test]
    fn test_parse_timestamp_invalid_calendar_date() {
        assert!(parse_file_name_timestamp("2023-13-5_9-0-0.csv", hk()).is_none());
        assert!(parse_file_name_timestamp("2023-2-30_9-0-0.csv", hk()).is_none());
        assert!(parse_file_name_timestamp("2023-1-5_25-0-0.csv", hk()).is_none());
    }

    #[test]
    fn test_parse_timestamp_offset_matters() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let at_utc = parse_file_name_timestamp("2023-1-5_9-0-0.csv", utc).unwrap();
        let at_hk = parse_file_name_timestamp("2023-1-5_9-0-0.csv", hk()).unwrap();
        assert_eq!(at_utc - at_hk, 8 * 3600 * 1000);
    }

    #[test]
    fn test_discover_orders_by_instant_not_name() {
        let dir = TempDir::new().unwrap();
        // Lexicographic name order is 10-0-0 before 9-0-0; instant order is the reverse
        fs::write(dir.path().join("2023-1-5_10-0-0.csv"), "").unwrap();
        fs::write(dir.path().join("2023-1-5_9-0-0.csv"), "").unwrap();

        let scan = discover_snapshots(dir.path(), 8, &[]).unwrap();
        assert_eq!(scan.snapshots.len(), 2);
        assert!(scan.snapshots[0]
            .path
            .to_string_lossy()
            .contains("9-0-0"));
        assert!(scan.snapshots[1]
            .path
            .to_string_lossy()
            .contains("10-0-0"));
    }

    #[test]
    fn test_discover_recurses_and_skips_malformed() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("2023").join("jan");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("2023-1-6_0-0-0.csv"), "").unwrap();
        fs::write(dir.path().join("2023-1-5_0-0-0.csv"), "").unwrap();
        fs::write(dir.path().join("readme.csv"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let scan = discover_snapshots(dir.path(), 8, &[]).unwrap();
        assert_eq!(scan.snapshots.len(), 2);
        assert_eq!(scan.skipped.len(), 1);
        assert!(scan.skipped[0].to_string_lossy().contains("readme"));
    }

    #[test]
    fn test_discover_excludes_working_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("2023-1-5_0-0-0.csv"), "").unwrap();
        let stale = dir.path().join("intermediates");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("CS101.csv"), "").unwrap();

        let scan = discover_snapshots(dir.path(), 8, &["intermediates", "products"]).unwrap();
        assert_eq!(scan.snapshots.len(), 1);
        assert!(scan.skipped.is_empty());
    }

    #[test]
    fn test_time_range() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("2023-1-5_9-0-0.csv"), "").unwrap();
        fs::write(dir.path().join("2023-1-5_10-0-0.csv"), "").unwrap();

        let scan = discover_snapshots(dir.path(), 8, &[]).unwrap();
        let (first, last) = scan.time_range_ms().unwrap();
        assert_eq!(last - first, 3600 * 1000);

        let empty = SnapshotScan::default();
        assert!(empty.time_range_ms().is_none());
    }
}
