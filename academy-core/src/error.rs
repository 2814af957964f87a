//! Error types for academy operations

use thiserror::Error;

/// Shared cache store errors.
///
/// None of these ever reach a viewer: the cache wrapper degrades to its
/// process-local map and the warm-up coordinator logs and moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Failed to serialize cache payload for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Failed to deserialize cache payload for {key}: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

impl CacheError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Errors raised while computing overview aggregates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("Data source query failed for {family}: {reason}")]
    SourceFailed { family: String, reason: String },

    #[error("Invalid chart range: {value}")]
    InvalidRange { value: String },

    #[error("Failed to encode {family} payload: {reason}")]
    Encoding { family: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for academy operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcademyError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias used across the academy crates.
pub type AcademyResult<T> = Result<T, AcademyError>;
