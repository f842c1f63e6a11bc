//! Error types for the planday_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for planday_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Template or request validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entry or template missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested day is at or below the last completed day
    #[error("Day {requested} is already behind the sequence (last completed: {last_completed})")]
    OrderViolation { last_completed: u32, requested: u32 },

    /// Requested day would skip ahead of the sequence
    #[error("Day {requested} skips ahead (last completed: {last_completed}, next allowed: {})", last_completed + 1)]
    SkippedDays { last_completed: u32, requested: u32 },

    /// No stored exercise matched a submitted result
    #[error("Exercise match error: {0}")]
    ExerciseMatch(String),

    /// Storage layer error
    #[error("Store error: {0}")]
    Store(String),
}
