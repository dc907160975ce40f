//! detection.raw_record.v1 schema definition
//!
//! A raw record is a flat mapping of column names to values. The engine reads:
//! - `timestamp` (required; records without a parseable one are dropped)
//! - `camera_id`, `location`, `class` (text, defaulted when missing)
//! - `confidence` (0-1, defaulted and clamped)
//! - `dog_count` (non-negative integer, defaulted)
//! - `image_url`, `image_path` (optional, passed through)
//!
//! Any other column is ignored.

use crate::normalizer::{parse_timestamp, KNOWN_COLUMNS};
use crate::types::{RawRecord, RawValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current input schema version
pub const SCHEMA_VERSION: &str = "detection.raw_record.v1";

/// Encodings a batch of raw records can arrive in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// JSON array of objects
    Json,
    /// Newline-delimited JSON objects
    Ndjson,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Csv => "csv",
            InputFormat::Json => "json",
            InputFormat::Ndjson => "ndjson",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(InputFormat::Csv),
            "json" => Ok(InputFormat::Json),
            "ndjson" | "jsonl" => Ok(InputFormat::Ndjson),
            other => Err(format!("unknown input format '{other}'")),
        }
    }
}

/// Problems found in a single record.
///
/// Only timestamp issues cause the record to be dropped; everything else is
/// repaired by the normalizer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordIssue {
    #[error("missing timestamp")]
    MissingTimestamp,

    #[error("unparseable timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("missing column {0} (default applied)")]
    MissingColumn(&'static str),

    #[error("non-numeric {column}: {value} (default applied)")]
    NonNumeric { column: &'static str, value: String },

    #[error("{column} out of range: {value} (clamped)")]
    OutOfRange { column: &'static str, value: String },

    #[error("unknown column {0} (ignored)")]
    UnknownColumn(String),
}

impl RecordIssue {
    /// True if this issue makes the normalizer drop the record
    pub fn drops_record(&self) -> bool {
        matches!(
            self,
            RecordIssue::MissingTimestamp | RecordIssue::InvalidTimestamp(_)
        )
    }
}

/// Check one record against the schema
pub fn inspect_record(record: &RawRecord) -> Vec<RecordIssue> {
    let mut issues = Vec::new();

    match record.get("timestamp") {
        None | Some(RawValue::Null) => issues.push(RecordIssue::MissingTimestamp),
        Some(value) => {
            if parse_timestamp(value).is_none() {
                issues.push(RecordIssue::InvalidTimestamp(describe(value)));
            }
        }
    }

    for column in ["camera_id", "location", "class"] {
        if is_blank(record.get(column)) {
            issues.push(RecordIssue::MissingColumn(column));
        }
    }

    check_numeric(record, "confidence", &mut issues, |n| (0.0..=1.0).contains(&n));
    check_numeric(record, "dog_count", &mut issues, |n| n >= 0.0);

    for key in record.keys() {
        if !KNOWN_COLUMNS.contains(&key) {
            issues.push(RecordIssue::UnknownColumn(key.to_string()));
        }
    }

    issues
}

fn check_numeric(
    record: &RawRecord,
    column: &'static str,
    issues: &mut Vec<RecordIssue>,
    in_range: impl Fn(f64) -> bool,
) {
    let value = match record.get(column) {
        Some(value) if !is_blank(Some(value)) => value,
        _ => {
            issues.push(RecordIssue::MissingColumn(column));
            return;
        }
    };

    let number = match value {
        RawValue::Number(n) => Some(*n),
        RawValue::Integer(i) => Some(*i as f64),
        RawValue::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite());

    match number {
        None => issues.push(RecordIssue::NonNumeric {
            column,
            value: describe(value),
        }),
        Some(n) if !in_range(n) => issues.push(RecordIssue::OutOfRange {
            column,
            value: describe(value),
        }),
        Some(_) => {}
    }
}

fn is_blank(value: Option<&RawValue>) -> bool {
    match value {
        None | Some(RawValue::Null) => true,
        Some(RawValue::Text(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn describe(value: &RawValue) -> String {
    match value {
        RawValue::Text(s) => format!("{s:?}"),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{other:?}")),
    }
}
