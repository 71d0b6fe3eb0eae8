//! Error types for the Pulse engine

use thiserror::Error;

/// Errors that can occur during computation.
///
/// Only configuration mistakes and malformed input are errors. Missing or
/// sparse sensor data never is: absence is expressed through explicit
/// `Option`/state fields in the result types so every consumer has to
/// handle it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid bar-day boundary hour: {0} (must be 0-23)")]
    InvalidBoundaryHour(u32),

    #[error("Missing venue id")]
    MissingVenueId,

    #[error("Invalid poll interval: {0}s (must be positive)")]
    InvalidPollInterval(i64),

    #[error("Failed to parse sensor payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Timestamp parse error: {0}")]
    TimestampError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Reading store error: {0}")]
    StoreError(String),
}
