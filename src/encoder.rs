//! Report encoding
//!
//! This module wraps a scored batch in a self-describing report envelope:
//! producer metadata, the window parameters used, a summary, the latest
//! alert, and the events themselves.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::summary::{latest_alert, summarize};
use crate::types::{DetectionEvent, ReportProducer, ReportWindow, SeverityReport};
use crate::{PRODUCER_NAME, STRAYGUARD_VERSION};
use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Encoder for severity reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Build a report for `events` scored under `config`
    pub fn encode(&self, events: &[DetectionEvent], config: &EngineConfig) -> SeverityReport {
        SeverityReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: STRAYGUARD_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            window: ReportWindow {
                window_sec: config.window.window_sec,
                saturation_count: config.window.saturation_count,
            },
            summary: summarize(events),
            alert: latest_alert(events),
            events: events.to_vec(),
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        events: &[DetectionEvent],
        config: &EngineConfig,
    ) -> Result<String, EngineError> {
        let report = self.encode(events, config);
        serde_json::to_string_pretty(&report).map_err(EngineError::JsonError)
    }
}

/// Encode events as NDJSON, one event per line
pub fn events_to_ndjson(events: &[DetectionEvent]) -> Result<String, EngineError> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}

/// Encode events as CSV with a header row
pub fn events_to_csv(events: &[DetectionEvent]) -> Result<String, EngineError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for event in events {
        writer.serialize(event)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| EngineError::EncodingError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| EngineError::EncodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SeverityEngine;
    use crate::types::{RawRecord, Severity};

    fn scored_batch() -> Vec<DetectionEvent> {
        let records: Vec<RawRecord> = (0..10)
            .map(|i| {
                RawRecord::new()
                    .with("timestamp", format!("2024-01-15 14:00:{:02}", i * 2))
                    .with("camera_id", "cam1")
                    .with("location", "Street A")
                    .with("confidence", 0.8)
                    .with("dog_count", 1i64)
            })
            .collect();
        SeverityEngine::new(EngineConfig::default())
            .unwrap()
            .score(&records)
    }

    #[test]
    fn test_encode_report() {
        let events = scored_batch();
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(&events, &EngineConfig::default());

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.version, STRAYGUARD_VERSION);
        assert_eq!(report.producer.instance_id, "test-instance");

        assert_eq!(report.window.window_sec, 30.0);
        assert_eq!(report.window.saturation_count, 10);

        assert_eq!(report.summary.total_detections, 10);
        assert_eq!(report.summary.unique_cameras, 1);
        assert_eq!(report.events.len(), 10);

        let alert = report.alert.unwrap();
        assert_eq!(alert.level, Severity::High);
        assert!(alert.message.contains("Camera: cam1"));
    }

    #[test]
    fn test_encode_empty_batch() {
        let report = ReportEncoder::new().encode(&[], &EngineConfig::default());
        assert!(report.events.is_empty());
        assert!(report.alert.is_none());
        assert_eq!(report.summary.total_detections, 0);
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = ReportEncoder::new();
        let json = encoder
            .encode_to_json(&scored_batch(), &EngineConfig::default())
            .unwrap();

        // Verify it's valid JSON
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.get("report_version").is_some());
        assert!(parsed.get("producer").is_some());
        assert!(parsed.get("summary").is_some());
        assert_eq!(parsed["events"][9]["severity"], "HIGH");
        assert_eq!(parsed["events"][0]["class"], "dog");
    }

    #[test]
    fn test_events_to_ndjson() {
        let ndjson = events_to_ndjson(&scored_batch()).unwrap();
        let lines: Vec<&str> = ndjson.lines().collect();
        assert_eq!(lines.len(), 10);
        let last: DetectionEvent = serde_json::from_str(lines[9]).unwrap();
        assert_eq!(last.event_rate, Some(1.0));
    }

    #[test]
    fn test_events_to_csv() {
        let csv = events_to_csv(&scored_batch()[..2]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,camera_id,location,class,confidence,dog_count,image_url,image_path,event_rate,severity,risk_score")
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("2024-01-15T14:00:00Z,cam1,Street A,dog,0.8,1,,,0.1,LOW,"));
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn test_events_to_csv_empty() {
        assert_eq!(events_to_csv(&[]).unwrap(), "");
    }

    #[test]
    fn test_instance_ids_are_unique() {
        assert_ne!(ReportEncoder::new().instance_id(), ReportEncoder::new().instance_id());
    }
}
