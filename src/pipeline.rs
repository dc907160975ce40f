//! Pipeline orchestration
//!
//! This module provides the public API for strayguard.
//! It orchestrates the full pipeline from raw records to scored events.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fuzzy::FuzzyClassifier;
use crate::normalizer::EventNormalizer;
use crate::schema::{InputFormat, RecordAdapter};
use crate::types::{DetectionEvent, RawRecord};
use crate::window::{FrequencyTracker, StreamingTracker};
use tracing::{debug, info};

/// Score a batch of raw records with the default configuration.
///
/// # Arguments
/// * `records` - Raw detection records in any column layout
///
/// # Returns
/// Retained events sorted by timestamp, each with `event_rate`, `severity`,
/// and `risk_score` set. Empty when no record survives normalization.
///
/// # Example
/// ```ignore
/// let scored = score_records(&records)?;
/// ```
pub fn score_records(records: &[RawRecord]) -> Result<Vec<DetectionEvent>, EngineError> {
    Ok(SeverityEngine::new(EngineConfig::default())?.score(records))
}

/// Batch scoring engine with a fixed configuration.
///
/// Holds no state between calls: every batch is scored from scratch.
#[derive(Debug, Clone)]
pub struct SeverityEngine {
    config: EngineConfig,
    tracker: FrequencyTracker,
    classifier: FuzzyClassifier,
}

impl SeverityEngine {
    /// Create an engine, rejecting invalid configuration
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let tracker = FrequencyTracker::new(&config.window)?;
        let classifier = FuzzyClassifier::new(&config)?;
        Ok(Self {
            config,
            tracker,
            classifier,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classifier(&self) -> &FuzzyClassifier {
        &self.classifier
    }

    /// Score raw records.
    ///
    /// Pipeline stages:
    /// 1. EventNormalizer - Coerce fields, drop records without a timestamp
    /// 2. FrequencyTracker - Per-camera rolling event rate
    /// 3. FuzzyClassifier - Severity label and risk score
    pub fn score(&self, records: &[RawRecord]) -> Vec<DetectionEvent> {
        let batch = EventNormalizer::normalize_batch(records);
        if !batch.dropped.is_empty() {
            debug!(dropped = batch.dropped.len(), "records dropped during normalization");
        }

        let events = self.score_events(batch.events);
        info!(
            records = records.len(),
            events = events.len(),
            "scored detection batch"
        );
        events
    }

    /// Score events that are already normalized.
    ///
    /// Any previously derived fields are recomputed.
    pub fn score_events(&self, mut events: Vec<DetectionEvent>) -> Vec<DetectionEvent> {
        if events.is_empty() {
            return events;
        }

        self.tracker.annotate(&mut events);
        for event in &mut events {
            let rate = event.event_rate.unwrap_or(0.0);
            let result = self.classifier.classify(event.confidence, event.dog_count, rate);
            event.severity = Some(result.severity);
            event.risk_score = Some(result.score);
        }
        events
    }

    /// Decode and score an encoded batch
    pub fn score_input(
        &self,
        input: &str,
        format: InputFormat,
    ) -> Result<Vec<DetectionEvent>, EngineError> {
        let records = RecordAdapter::parse(input, format)?;
        Ok(self.score(&records))
    }
}

/// Incremental engine for records that arrive one at a time.
///
/// Rates are computed over the events seen so far; a record older than the
/// last one accepted for its camera is rejected.
pub struct StreamingEngine {
    tracker: StreamingTracker,
    classifier: FuzzyClassifier,
}

impl StreamingEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            tracker: StreamingTracker::new(&config.window)?,
            classifier: FuzzyClassifier::new(config)?,
        })
    }

    /// Score one record.
    ///
    /// Returns `Ok(None)` when the record has no parseable timestamp.
    pub fn push(&mut self, record: &RawRecord) -> Result<Option<DetectionEvent>, EngineError> {
        let Some(mut event) = EventNormalizer::normalize(record) else {
            debug!("dropping streamed record without a valid timestamp");
            return Ok(None);
        };

        let rate = self.tracker.observe(&event.camera_id, event.timestamp)?;
        let result = self.classifier.classify(event.confidence, event.dog_count, rate);
        event.event_rate = Some(rate);
        event.severity = Some(result.severity);
        event.risk_score = Some(result.score);
        Ok(Some(event))
    }

    /// Forget all window state
    pub fn reset(&mut self) {
        self.tracker.reset();
    }
}
