//! Row schema and the per-course output document.
//!
//! Snapshot rows have fixed columns; the pivot stage appends one trailing
//! column holding the snapshot's capture instant in epoch milliseconds.

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column indices of a snapshot row, plus the timestamp column appended by
/// the pivot stage.
pub mod columns {
    pub const AVAILABLE_SEATS: usize = 0;
    pub const CAPACITY: usize = 1;
    pub const CODE: usize = 2;
    pub const CREDIT: usize = 3;
    pub const DEPARTMENT: usize = 4;
    pub const LEVELS: usize = 5;
    pub const TITLE: usize = 6;
    pub const WAITLIST_AVAILABLE: usize = 7;
    pub const WEB_ENABLED: usize = 8;

    /// Number of columns in a raw snapshot row
    pub const SNAPSHOT_WIDTH: usize = 9;

    /// Timestamp column appended to intermediate rows
    pub const TIMESTAMP: usize = 9;
}

/// A malformed row in a snapshot or intermediate file.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("row has {found} columns, expected at least {expected}")]
    TooFewColumns { expected: usize, found: usize },

    #[error("column {column} has non-integer value {value:?}")]
    InvalidInt { column: &'static str, value: String },
}

fn int_field<T>(record: &StringRecord, index: usize, column: &'static str) -> Result<T, RowError>
where
    T: std::str::FromStr,
{
    let raw = record.get(index).ok_or(RowError::TooFewColumns {
        expected: index + 1,
        found: record.len(),
    })?;
    // Parsing at the target width rejects out-of-range values instead of
    // wrapping them
    raw.trim().parse().map_err(|_| RowError::InvalidInt {
        column,
        value: raw.to_string(),
    })
}

fn str_field(record: &StringRecord, index: usize) -> Result<&str, RowError> {
    record.get(index).ok_or(RowError::TooFewColumns {
        expected: index + 1,
        found: record.len(),
    })
}

/// One seat-availability observation at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub available_seats: i32,
    pub capacity: i32,
    /// Preserved verbatim from the scrape; not a boolean upstream
    pub waitlist_available: String,
    pub web_enabled: bool,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl LogRecord {
    /// Parse an observation from an intermediate row (snapshot columns plus
    /// the appended timestamp column).
    pub fn from_intermediate_row(record: &StringRecord) -> Result<Self, RowError> {
        Ok(Self {
            available_seats: int_field(record, columns::AVAILABLE_SEATS, "availableSeats")?,
            capacity: int_field(record, columns::CAPACITY, "capacity")?,
            waitlist_available: str_field(record, columns::WAITLIST_AVAILABLE)?.to_string(),
            // Exact match only: "TRUE" and any other variant read as false
            web_enabled: str_field(record, columns::WEB_ENABLED)? == "true",
            timestamp: int_field(record, columns::TIMESTAMP, "timestamp")?,
        })
    }
}

/// The per-course aggregate document written to `products/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDocument {
    pub code: String,
    pub credit: i32,
    pub department: String,
    /// Level tags, sorted lexicographically ascending (duplicates kept)
    pub levels: Vec<String>,
    pub title: String,
    /// Observations in snapshot-timestamp order
    pub log_records: Vec<LogRecord>,
}

impl CourseDocument {
    /// Build a document from the last intermediate row's static fields and
    /// the accumulated observation list.
    ///
    /// The last row is authoritative: if a course's metadata changed across
    /// snapshots, only the final value survives.
    pub fn from_last_row(
        last_row: &StringRecord,
        log_records: Vec<LogRecord>,
    ) -> Result<Self, RowError> {
        Ok(Self {
            code: str_field(last_row, columns::CODE)?.to_string(),
            credit: int_field(last_row, columns::CREDIT, "credit")?,
            department: str_field(last_row, columns::DEPARTMENT)?.to_string(),
            levels: split_levels(str_field(last_row, columns::LEVELS)?),
            title: str_field(last_row, columns::TITLE)?.to_string(),
            log_records,
        })
    }
}

/// Split the levels column on `,` and sort ascending. Sort only, no
/// deduplication.
pub fn split_levels(raw: &str) -> Vec<String> {
    let mut levels: Vec<String> = raw.split(',').map(str::to_string).collect();
    levels.sort();
    levels
}
