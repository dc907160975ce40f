//! Rolling window frequency tracking
//!
//! For every event, counts how many events of the same camera fall in the
//! inclusive trailing window `[t - W, t]` and normalizes that count by the
//! saturation count `M`, giving an event rate in `[0, 1]`.

use crate::config::{WindowConfig, MAX_WINDOW_SEC};
use crate::error::EngineError;
use crate::types::DetectionEvent;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

/// Batch frequency tracker over a fixed window configuration
#[derive(Debug, Clone)]
pub struct FrequencyTracker {
    window: Duration,
    saturation_count: u32,
}

impl Default for FrequencyTracker {
    fn default() -> Self {
        Self::from_config(&WindowConfig::default())
    }
}

impl FrequencyTracker {
    /// Create a tracker, rejecting an out-of-range window or zero saturation
    pub fn new(config: &WindowConfig) -> Result<Self, EngineError> {
        if !config.window_sec.is_finite()
            || config.window_sec <= 0.0
            || config.window_sec > MAX_WINDOW_SEC
        {
            return Err(EngineError::InvalidConfig(format!(
                "window_sec must be in (0, {MAX_WINDOW_SEC}], got {}",
                config.window_sec
            )));
        }
        if config.saturation_count == 0 {
            return Err(EngineError::InvalidConfig(
                "saturation_count must be at least 1".to_string(),
            ));
        }
        Ok(Self::from_config(config))
    }

    fn from_config(config: &WindowConfig) -> Self {
        Self {
            window: window_duration(config.window_sec),
            saturation_count: config.saturation_count,
        }
    }

    /// Rates for one camera's timestamps, which must be non-decreasing.
    pub fn rate_sequence(
        &self,
        camera_id: &str,
        timestamps: &[DateTime<Utc>],
    ) -> Result<Vec<f64>, EngineError> {
        if let Some(pos) = timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(EngineError::OutOfOrder {
                camera_id: camera_id.to_string(),
                detail: format!(
                    "timestamp at position {} ({}) precedes position {} ({})",
                    pos + 1,
                    timestamps[pos + 1],
                    pos,
                    timestamps[pos]
                ),
            });
        }
        Ok(self
            .sliding_counts(timestamps)
            .into_iter()
            .map(|count| self.normalize(count))
            .collect())
    }

    /// Annotate `event_rate` on every event, isolating cameras from each other.
    ///
    /// Events may arrive in any order; each camera's events are visited in
    /// timestamp order. The slice itself is not reordered.
    pub fn annotate(&self, events: &mut [DetectionEvent]) {
        for (camera_id, indices) in group_by_camera(events) {
            let timestamps: Vec<DateTime<Utc>> =
                indices.iter().map(|&i| events[i].timestamp).collect();
            let counts = self.sliding_counts(&timestamps);
            debug!(
                camera_id = %camera_id,
                events = indices.len(),
                peak_count = counts.iter().copied().max().unwrap_or(0),
                "computed camera window"
            );
            for (&i, count) in indices.iter().zip(counts) {
                events[i].event_rate = Some(self.normalize(count));
            }
        }
    }

    /// In-window counts via two pointers over sorted timestamps.
    ///
    /// `hi` runs past every timestamp equal to the current one, so events
    /// sharing an instant all see each other.
    fn sliding_counts(&self, timestamps: &[DateTime<Utc>]) -> Vec<usize> {
        let mut counts = Vec::with_capacity(timestamps.len());
        let mut lo = 0;
        let mut hi = 0;
        for &t in timestamps {
            let start = window_start(t, self.window);
            while hi < timestamps.len() && timestamps[hi] <= t {
                hi += 1;
            }
            while timestamps[lo] < start {
                lo += 1;
            }
            counts.push(hi - lo);
        }
        counts
    }

    fn normalize(&self, count: usize) -> f64 {
        (count as f64 / f64::from(self.saturation_count)).clamp(0.0, 1.0)
    }
}

/// Indices of each camera's events, stably sorted by timestamp
fn group_by_camera(events: &[DetectionEvent]) -> BTreeMap<String, Vec<usize>> {
    let mut by_camera: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, event) in events.iter().enumerate() {
        by_camera.entry(event.camera_id.clone()).or_default().push(i);
    }
    for indices in by_camera.values_mut() {
        indices.sort_by_key(|&i| events[i].timestamp);
    }
    by_camera
}

fn window_duration(window_sec: f64) -> Duration {
    Duration::microseconds((window_sec * 1_000_000.0).round() as i64)
}

/// Start of the window ending at `t`, clamped to the earliest representable instant
fn window_start(t: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    t.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Incremental tracker for events that arrive one at a time
#[derive(Debug, Clone)]
pub struct StreamingTracker {
    window: Duration,
    saturation_count: u32,
    recent: HashMap<String, VecDeque<DateTime<Utc>>>,
}

impl StreamingTracker {
    pub fn new(config: &WindowConfig) -> Result<Self, EngineError> {
        let batch = FrequencyTracker::new(config)?;
        Ok(Self {
            window: batch.window,
            saturation_count: batch.saturation_count,
            recent: HashMap::new(),
        })
    }

    /// Record one event and return its rate.
    ///
    /// An event older than the last one seen for its camera is rejected and
    /// leaves the tracker unchanged.
    pub fn observe(
        &mut self,
        camera_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<f64, EngineError> {
        let queue = self.recent.entry(camera_id.to_string()).or_default();
        if let Some(&last) = queue.back() {
            if timestamp < last {
                return Err(EngineError::OutOfOrder {
                    camera_id: camera_id.to_string(),
                    detail: format!("{timestamp} arrived after {last}"),
                });
            }
        }

        let start = window_start(timestamp, self.window);
        while queue.front().is_some_and(|&front| front < start) {
            queue.pop_front();
        }
        queue.push_back(timestamp);

        Ok((queue.len() as f64 / f64::from(self.saturation_count)).clamp(0.0, 1.0))
    }

    /// Number of cameras with at least one event in memory
    pub fn camera_count(&self) -> usize {
        self.recent.len()
    }

    /// Forget all state
    pub fn reset(&mut self) {
        self.recent.clear();
    }
}
