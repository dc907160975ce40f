//! Event normalization
//!
//! This module coerces raw records into well-formed detection events.
//! - Missing identity columns fall back to fixed defaults
//! - Confidence coerced to a number and clamped to 0-1
//! - Object count coerced to a non-negative integer
//! - Records without a parseable timestamp are dropped

use crate::types::{DetectionEvent, RawRecord, RawValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

/// Camera identity used when the column is missing or empty
pub const DEFAULT_CAMERA_ID: &str = "unknown";

/// Location label used when the column is missing or empty
pub const DEFAULT_LOCATION: &str = "unknown";

/// Object class used when the column is missing or empty
pub const DEFAULT_CLASS: &str = "dog";

/// Confidence used when the column is missing or non-numeric
pub const DEFAULT_CONFIDENCE: f64 = 0.0;

/// Object count used when the column is missing or non-numeric
pub const DEFAULT_DOG_COUNT: u32 = 1;

/// Columns every event carries after normalization
pub const KNOWN_COLUMNS: [&str; 8] = [
    "timestamp",
    "camera_id",
    "location",
    "class",
    "confidence",
    "dog_count",
    "image_url",
    "image_path",
];

// `%Y` takes signed years past 9999, which RFC 3339 parsing rejects
const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Outcome of normalizing a batch
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Retained events, sorted by timestamp
    pub events: Vec<DetectionEvent>,
    /// Input positions of dropped records
    pub dropped: Vec<usize>,
}

/// Normalizer for converting raw records to detection events
pub struct EventNormalizer;

impl EventNormalizer {
    /// Normalize one record, or `None` if its timestamp cannot be parsed
    pub fn normalize(record: &RawRecord) -> Option<DetectionEvent> {
        let timestamp = record.get("timestamp").and_then(parse_timestamp)?;

        Some(DetectionEvent {
            timestamp,
            camera_id: text_or(record, "camera_id", DEFAULT_CAMERA_ID),
            location: text_or(record, "location", DEFAULT_LOCATION),
            object_class: text_or(record, "class", DEFAULT_CLASS),
            confidence: record
                .get("confidence")
                .and_then(coerce_f64)
                .unwrap_or(DEFAULT_CONFIDENCE)
                .clamp(0.0, 1.0),
            dog_count: record
                .get("dog_count")
                .and_then(coerce_count)
                .unwrap_or(DEFAULT_DOG_COUNT),
            image_url: optional_text(record, "image_url"),
            image_path: optional_text(record, "image_path"),
            event_rate: None,
            severity: None,
            risk_score: None,
        })
    }

    /// Normalize a batch, dropping unparseable records and sorting by time.
    ///
    /// The sort is stable: events sharing a timestamp keep their input order.
    pub fn normalize_batch(records: &[RawRecord]) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        for (index, record) in records.iter().enumerate() {
            match Self::normalize(record) {
                Some(event) => batch.events.push(event),
                None => {
                    debug!(index, "dropping record without a valid timestamp");
                    batch.dropped.push(index);
                }
            }
        }
        batch.events.sort_by_key(|e| e.timestamp);
        batch
    }
}

/// Parse a timestamp from text or Unix epoch seconds
pub fn parse_timestamp(value: &RawValue) -> Option<DateTime<Utc>> {
    match value {
        RawValue::Text(s) => parse_timestamp_str(s),
        RawValue::Integer(secs) => DateTime::from_timestamp(*secs, 0),
        RawValue::Number(secs) if secs.is_finite() => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos)
        }
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Numeric coercion: numbers and numeric text; non-finite counts as missing
fn coerce_f64(value: &RawValue) -> Option<f64> {
    let n = match value {
        RawValue::Number(n) => *n,
        RawValue::Integer(i) => *i as f64,
        RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Count coercion: truncates toward zero, floors negatives at 0
fn coerce_count(value: &RawValue) -> Option<u32> {
    let n = match value {
        RawValue::Integer(i) => *i,
        RawValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => i,
            Err(_) => coerce_f64(value)?.trunc() as i64,
        },
        _ => coerce_f64(value)?.trunc() as i64,
    };
    Some(n.clamp(0, i64::from(u32::MAX)) as u32)
}

fn optional_text(record: &RawRecord, key: &str) -> Option<String> {
    match record.get(key)? {
        RawValue::Text(s) if !s.trim().is_empty() => Some(s.clone()),
        RawValue::Integer(i) => Some(i.to_string()),
        RawValue::Number(n) if n.is_finite() => Some(n.to_string()),
        RawValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_or(record: &RawRecord, key: &str, default: &str) -> String {
    optional_text(record, key).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SecondsFormat, TimeZone};

    fn full_record() -> RawRecord {
        RawRecord::new()
            .with("timestamp", "2024-01-15 14:00:05")
            .with("camera_id", "cam1")
            .with("location", "Street A")
            .with("class", "dog")
            .with("confidence", "0.87")
            .with("dog_count", "2")
            .with("image_url", "https://example.org/snap.jpg")
    }

    #[test]
    fn test_normalize_full_record() {
        let event = EventNormalizer::normalize(&full_record()).unwrap();

        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 5).unwrap()
        );
        assert_eq!(event.camera_id, "cam1");
        assert_eq!(event.location, "Street A");
        assert_eq!(event.object_class, "dog");
        assert!((event.confidence - 0.87).abs() < 1e-9);
        assert_eq!(event.dog_count, 2);
        assert_eq!(event.image_url.as_deref(), Some("https://example.org/snap.jpg"));
        assert_eq!(event.image_path, None);
        assert!(event.event_rate.is_none());
        assert!(event.severity.is_none());
    }

    #[test]
    fn test_missing_columns_get_defaults() {
        let record = RawRecord::new().with("timestamp", "2024-01-15T14:00:00Z");
        let event = EventNormalizer::normalize(&record).unwrap();

        assert_eq!(event.camera_id, DEFAULT_CAMERA_ID);
        assert_eq!(event.location, DEFAULT_LOCATION);
        assert_eq!(event.object_class, DEFAULT_CLASS);
        assert_eq!(event.confidence, 0.0);
        assert_eq!(event.dog_count, 1);
    }

    #[test]
    fn test_blank_and_null_values_count_as_missing() {
        let record = RawRecord::new()
            .with("timestamp", "2024-01-15T14:00:00Z")
            .with("camera_id", "   ")
            .with("location", RawValue::Null)
            .with("confidence", "")
            .with("dog_count", RawValue::Null);
        let event = EventNormalizer::normalize(&record).unwrap();

        assert_eq!(event.camera_id, "unknown");
        assert_eq!(event.location, "unknown");
        assert_eq!(event.confidence, 0.0);
        assert_eq!(event.dog_count, 1);
    }

    #[test]
    fn test_confidence_coercion() {
        let base = RawRecord::new().with("timestamp", "2024-01-15T14:00:00Z");
        let conf = |v: RawValue| {
            EventNormalizer::normalize(&base.clone().with("confidence", v))
                .unwrap()
                .confidence
        };

        assert_eq!(conf(RawValue::Number(1.4)), 1.0);
        assert_eq!(conf(RawValue::Number(-0.2)), 0.0);
        assert_eq!(conf(RawValue::Integer(1)), 1.0);
        assert_eq!(conf("high".into()), 0.0);
        assert_eq!(conf("NaN".into()), 0.0);
        assert_eq!(conf(" 0.5 ".into()), 0.5);
        assert_eq!(conf(RawValue::Bool(true)), 0.0);
    }

    #[test]
    fn test_dog_count_coercion() {
        let base = RawRecord::new().with("timestamp", "2024-01-15T14:00:00Z");
        let count = |v: RawValue| {
            EventNormalizer::normalize(&base.clone().with("dog_count", v))
                .unwrap()
                .dog_count
        };

        assert_eq!(count(RawValue::Integer(3)), 3);
        assert_eq!(count(RawValue::Number(2.9)), 2);
        assert_eq!(count("4".into()), 4);
        assert_eq!(count("2.0".into()), 2);
        assert_eq!(count(RawValue::Integer(-2)), 0);
        assert_eq!(count("several".into()), 1);
        assert_eq!(count(RawValue::Number(f64::INFINITY)), 1);
    }

    #[test]
    fn test_numeric_identity_columns_become_text() {
        let record = RawRecord::new()
            .with("timestamp", "2024-01-15T14:00:00Z")
            .with("camera_id", RawValue::Integer(7));
        let event = EventNormalizer::normalize(&record).unwrap();
        assert_eq!(event.camera_id, "7");
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        for raw in [
            "2024-01-15T14:00:00Z",
            "2024-01-15T16:00:00+02:00",
            "2024-01-15 14:00:00",
            "2024-01-15T14:00:00",
            "2024-01-15 14:00:00.000",
            "2024/01/15 14:00:00",
            "2024-01-15 14:00",
            " 2024-01-15 14:00:00 ",
        ] {
            let parsed = parse_timestamp(&RawValue::from(raw));
            assert_eq!(parsed, Some(expected), "format {raw:?}");
        }

        let midnight = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&"2024-01-15".into()), Some(midnight));
    }

    #[test]
    fn test_epoch_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        let secs = expected.timestamp();
        assert_eq!(parse_timestamp(&RawValue::Integer(secs)), Some(expected));

        let half = parse_timestamp(&RawValue::Number(secs as f64 + 0.5)).unwrap();
        assert_eq!(half.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_extended_year_timestamps() {
        let year_10000 = DateTime::from_timestamp(253_402_300_800, 0);
        assert_eq!(
            parse_timestamp(&RawValue::from("+10000-01-01T00:00:00Z")),
            year_10000
        );

        for t in [year_10000.unwrap(), DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC] {
            let text = t.to_rfc3339_opts(SecondsFormat::AutoSi, true);
            assert_eq!(parse_timestamp(&RawValue::from(text.as_str())), Some(t), "{text}");
        }
    }

    #[test]
    fn test_unparseable_timestamps() {
        for raw in ["", "yesterday", "2024-13-45 99:00:00", "15/01/2024"] {
            assert_eq!(parse_timestamp(&RawValue::from(raw)), None, "input {raw:?}");
        }
        assert_eq!(parse_timestamp(&RawValue::Null), None);
        assert_eq!(parse_timestamp(&RawValue::Bool(true)), None);
        assert_eq!(parse_timestamp(&RawValue::Number(f64::NAN)), None);
    }

    #[test]
    fn test_batch_drops_and_sorts() {
        let records = vec![
            RawRecord::new()
                .with("timestamp", "2024-01-15 14:00:10")
                .with("camera_id", "b"),
            RawRecord::new().with("timestamp", "not a time"),
            RawRecord::new()
                .with("timestamp", "2024-01-15 14:00:00")
                .with("camera_id", "a"),
            RawRecord::new().with("camera_id", "no timestamp"),
            RawRecord::new()
                .with("timestamp", "2024-01-15 14:00:10")
                .with("camera_id", "c"),
        ];

        let batch = EventNormalizer::normalize_batch(&records);

        assert_eq!(batch.dropped, vec![1, 3]);
        let cameras: Vec<&str> = batch.events.iter().map(|e| e.camera_id.as_str()).collect();
        assert_eq!(cameras, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_batch() {
        let batch = EventNormalizer::normalize_batch(&[]);
        assert!(batch.events.is_empty());
        assert!(batch.dropped.is_empty());
    }
}
