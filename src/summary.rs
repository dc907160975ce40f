//! Batch summaries
//!
//! Aggregates a scored batch into the figures a monitoring view shows:
//! totals, distinct cameras and locations, the detection time span, an
//! hourly histogram, severity counts, and an alert for the latest event.

use crate::types::{
    Alert, DetectionEvent, DetectionSummary, HourlyBucket, Severity, SeverityCounts,
};
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Summarize a batch of events (scored or not)
pub fn summarize(events: &[DetectionEvent]) -> DetectionSummary {
    let cameras: BTreeSet<&str> = events.iter().map(|e| e.camera_id.as_str()).collect();
    let locations: BTreeSet<&str> = events.iter().map(|e| e.location.as_str()).collect();

    DetectionSummary {
        total_detections: events.len(),
        unique_cameras: cameras.len(),
        unique_locations: locations.len(),
        first_detection_utc: events.iter().map(|e| e.timestamp).min(),
        last_detection_utc: events.iter().map(|e| e.timestamp).max(),
        severity_counts: count_severities(events),
        hourly: hourly_histogram(events),
    }
}

/// Count events per severity label
pub fn count_severities(events: &[DetectionEvent]) -> SeverityCounts {
    let mut counts = SeverityCounts::default();
    for event in events {
        match event.severity {
            Some(Severity::High) => counts.high += 1,
            Some(Severity::Med) => counts.med += 1,
            Some(Severity::Low) => counts.low += 1,
            None => counts.unscored += 1,
        }
    }
    counts
}

/// Detections per UTC hour, oldest bucket first. Hours with no detections
/// are omitted.
pub fn hourly_histogram(events: &[DetectionEvent]) -> Vec<HourlyBucket> {
    let mut buckets: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
    for event in events {
        *buckets.entry(floor_to_hour(event.timestamp)).or_default() += 1;
    }
    buckets
        .into_iter()
        .map(|(hour_start_utc, detections)| HourlyBucket {
            hour_start_utc,
            detections,
        })
        .collect()
}

/// Alert for the most recent scored event.
///
/// Ties on timestamp resolve to the event that comes last in the batch.
/// Returns `None` for an empty batch or when the latest event is unscored.
pub fn latest_alert(events: &[DetectionEvent]) -> Option<Alert> {
    let latest = events.iter().max_by_key(|e| e.timestamp)?;
    let level = latest.severity?;
    let risk_score = latest.risk_score?;

    let headline = match level {
        Severity::High => "High-risk detection.",
        Severity::Med => "Detection requires attention.",
        Severity::Low => "Latest event:",
    };
    let message = format!(
        "{headline} Camera: {} | Location: {} | Conf: {:.2} | Dogs: {} | Severity: {}",
        latest.camera_id, latest.location, latest.confidence, latest.dog_count, level
    );

    Some(Alert {
        level,
        timestamp: latest.timestamp,
        camera_id: latest.camera_id.clone(),
        location: latest.location.clone(),
        confidence: latest.confidence,
        dog_count: latest.dog_count,
        risk_score,
        message,
    })
}

fn floor_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .duration_trunc(Duration::hours(1))
        .unwrap_or(timestamp)
}
