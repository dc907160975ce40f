//! Strayguard - Severity scoring engine for stray-animal detection events
//!
//! Strayguard turns raw camera detections into prioritized events through a
//! deterministic pipeline: record decoding → normalization → per-camera
//! rolling-window frequency → fuzzy severity classification → reporting.
//!
//! ## Modules
//!
//! - **Scoring**: `normalizer`, `window`, `fuzzy`, orchestrated by `pipeline`
//! - **Input**: `schema` decodes CSV, JSON, and NDJSON feeds
//! - **Output**: `summary`, `filter`, and `encoder` shape scored batches

pub mod config;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod fuzzy;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod summary;
pub mod types;
pub mod window;

pub use config::EngineConfig;
pub use encoder::{events_to_csv, events_to_ndjson, ReportEncoder, REPORT_VERSION};
pub use error::EngineError;
pub use filter::EventFilter;
pub use fuzzy::{trapmf, Classification, FuzzyClassifier, Trapezoid};
pub use pipeline::{score_records, SeverityEngine, StreamingEngine};
pub use types::{DetectionEvent, RawRecord, RawValue, Severity, SeverityReport};

// Schema exports
pub use schema::{InputFormat, RecordAdapter, SCHEMA_VERSION};

/// Strayguard version embedded in all reports
pub const STRAYGUARD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "strayguard";
