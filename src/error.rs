//! Error types for strayguard

use thiserror::Error;

/// Errors that can occur while decoding, configuring, or scoring events
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Out-of-order event for camera {camera_id}: {detail}")]
    OutOfOrder { camera_id: String, detail: String },

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
