//! Event filtering
//!
//! Narrows a scored batch by camera, location, and severity. An unset
//! criterion matches everything.

use crate::types::{DetectionEvent, Severity};

/// Conjunction of optional equality criteria
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub camera_id: Option<String>,
    pub location: Option<String>,
    pub severity: Option<Severity>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(mut self, camera_id: impl Into<String>) -> Self {
        self.camera_id = Some(camera_id.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        self.camera_id.is_none() && self.location.is_none() && self.severity.is_none()
    }

    /// An event with no severity never matches a severity criterion
    pub fn matches(&self, event: &DetectionEvent) -> bool {
        self.camera_id.as_ref().map_or(true, |c| *c == event.camera_id)
            && self.location.as_ref().map_or(true, |l| *l == event.location)
            && self.severity.map_or(true, |s| event.severity == Some(s))
    }

    /// Keep matching events, preserving order
    pub fn apply(&self, events: Vec<DetectionEvent>) -> Vec<DetectionEvent> {
        if self.is_empty() {
            return events;
        }
        events.into_iter().filter(|e| self.matches(e)).collect()
    }
}

/// Last `n` events of a batch
pub fn tail(events: &[DetectionEvent], n: usize) -> &[DetectionEvent] {
    &events[events.len().saturating_sub(n)..]
}
