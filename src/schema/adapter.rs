//! Adapter for decoding detection.raw_record.v1 batches
//!
//! Decodes CSV, JSON arrays, and NDJSON into raw records. Decoding is
//! tolerant: a CSV row that cannot be read is skipped with a warning, while a
//! malformed JSON document is an error.

use crate::error::EngineError;
use crate::schema::record::{inspect_record, InputFormat, RecordIssue};
use crate::types::{RawRecord, RawValue};
use tracing::warn;

/// Adapter for converting encoded feeds to raw records
pub struct RecordAdapter;

impl RecordAdapter {
    /// Decode `input` in the given format
    pub fn parse(input: &str, format: InputFormat) -> Result<Vec<RawRecord>, EngineError> {
        match format {
            InputFormat::Csv => Self::parse_csv(input),
            InputFormat::Json => Self::parse_array(input),
            InputFormat::Ndjson => Self::parse_ndjson(input),
        }
    }

    /// Parse CSV with a header row; empty cells become null
    pub fn parse_csv(input: &str) -> Result<Vec<RawRecord>, EngineError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input.as_bytes());

        let headers = reader.headers()?.clone();
        let mut records = Vec::new();

        for (row, result) in reader.records().enumerate() {
            let row_record = match result {
                Ok(r) => r,
                Err(e) => {
                    warn!(row = row + 1, error = %e, "skipping unreadable CSV row");
                    continue;
                }
            };

            let record: RawRecord = headers
                .iter()
                .zip(row_record.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| {
                    let value = if cell.is_empty() {
                        RawValue::Null
                    } else {
                        RawValue::Text(cell.to_string())
                    };
                    (header.to_string(), value)
                })
                .collect();
            records.push(record);
        }

        Ok(records)
    }

    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<RawRecord>, EngineError> {
        let records: Vec<RawRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing records
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawRecord>, EngineError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            records.push(Self::parse_line(trimmed).map_err(|e| {
                EngineError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?);
        }
        Ok(records)
    }

    /// Parse a single JSON object
    pub fn parse_line(line: &str) -> Result<RawRecord, EngineError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Check a batch and report every record with at least one issue
    pub fn validate_records(records: &[RawRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| ValidationResult {
                index,
                camera_id: record
                    .get("camera_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                issues: inspect_record(record),
            })
            .filter(|r| !r.issues.is_empty())
            .collect()
    }
}

/// Result of record validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub camera_id: Option<String>,
    pub issues: Vec<RecordIssue>,
}

impl ValidationResult {
    /// True if the normalizer will drop this record
    pub fn dropped(&self) -> bool {
        self.issues.iter().any(RecordIssue::drops_record)
    }
}
