//! Core types for the strayguard engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: raw records, detection events, severity labels, and report output.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Discrete severity label derived from the continuous risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Med,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Med => "MED",
            Severity::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Severity::High),
            "MED" | "MEDIUM" => Ok(Severity::Med),
            "LOW" => Ok(Severity::Low),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// A single untyped field value as it arrived from the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    /// Arrays and objects are kept opaque
    Nested(serde_json::Value),
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Integer(v)
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        RawValue::Bool(v)
    }
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One raw record: column name to raw value, for any set of columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<RawValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, RawValue)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (String, RawValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A normalized detection event, optionally enriched with derived fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Detection instant (UTC)
    pub timestamp: DateTime<Utc>,
    /// Originating camera
    pub camera_id: String,
    /// Human-readable location label
    pub location: String,
    /// Detected object category
    #[serde(rename = "class")]
    pub object_class: String,
    /// Detector confidence (0-1)
    pub confidence: f64,
    /// Number of objects in this detection
    pub dog_count: u32,
    /// Public snapshot URL, passed through
    pub image_url: Option<String>,
    /// Local snapshot path, passed through
    pub image_path: Option<String>,
    /// Normalized recent event rate (0-1), set by the frequency tracker
    pub event_rate: Option<f64>,
    /// Severity label, set by the classifier
    pub severity: Option<Severity>,
    /// Continuous risk score behind the label
    pub risk_score: Option<f64>,
}

impl DetectionEvent {
    /// True once both enrichment passes have run
    pub fn is_scored(&self) -> bool {
        self.event_rate.is_some() && self.severity.is_some() && self.risk_score.is_some()
    }

    /// Raw fields of this event, without any derived columns
    pub fn to_record(&self) -> RawRecord {
        let mut record = RawRecord::new()
            .with(
                "timestamp",
                self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )
            .with("camera_id", self.camera_id.as_str())
            .with("location", self.location.as_str())
            .with("class", self.object_class.as_str())
            .with("confidence", self.confidence)
            .with("dog_count", i64::from(self.dog_count));
        if let Some(url) = &self.image_url {
            record.insert("image_url", url.as_str());
        }
        if let Some(path) = &self.image_path {
            record.insert("image_path", path.as_str());
        }
        record
    }
}

/// Per-label event counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub med: usize,
    pub low: usize,
    /// Events that have not been classified
    pub unscored: usize,
}

/// Number of detections starting in one clock hour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub hour_start_utc: DateTime<Utc>,
    pub detections: usize,
}

/// Key figures over a set of events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub total_detections: usize,
    pub unique_cameras: usize,
    pub unique_locations: usize,
    pub first_detection_utc: Option<DateTime<Utc>>,
    pub last_detection_utc: Option<DateTime<Utc>>,
    pub severity_counts: SeverityCounts,
    pub hourly: Vec<HourlyBucket>,
}

/// Alert derived from the most recent event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: Severity,
    pub timestamp: DateTime<Utc>,
    pub camera_id: String,
    pub location: String,
    pub confidence: f64,
    pub dog_count: u32,
    pub risk_score: f64,
    pub message: String,
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Window parameters the report was computed with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportWindow {
    pub window_sec: f64,
    pub saturation_count: u32,
}

/// Complete scored-batch report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub window: ReportWindow,
    pub summary: DetectionSummary,
    pub alert: Option<Alert>,
    pub events: Vec<DetectionEvent>,
}
