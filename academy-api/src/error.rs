//! Error Types for the Academy API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.
//! Overview fragments never produce these for cache or aggregation
//! problems; those degrade to a loading state instead.

use academy_core::{AcademyError, AggregationError, CacheError, ConfigError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401, 403)
    // ========================================================================
    /// Request lacks a valid session
    Unauthorized,

    /// Viewer is signed in but may not use the resource
    Forbidden,

    /// Session token is invalid or malformed
    InvalidToken,

    /// Session token has expired
    TokenExpired,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Field value is out of valid range
    InvalidRange,

    /// Field format is incorrect
    InvalidFormat,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested landing page section does not exist
    SectionNotFound,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Shared cache store could not be reached
    CacheUnavailable,

    /// A content or metric source failed
    SourceFailed,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized
            | ErrorCode::InvalidToken
            | ErrorCode::TokenExpired => StatusCode::UNAUTHORIZED,

            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::InvalidInput
            | ErrorCode::InvalidRange
            | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,

            ErrorCode::SectionNotFound => StatusCode::NOT_FOUND,

            ErrorCode::CacheUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError | ErrorCode::SourceFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            // Authentication
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::InvalidToken => "Invalid session token",
            ErrorCode::TokenExpired => "Session has expired",

            // Validation
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::InvalidRange => "Value is out of valid range",
            ErrorCode::InvalidFormat => "Invalid format",

            // Not Found
            ErrorCode::SectionNotFound => "Section not found",

            // Server
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::CacheUnavailable => "Cache store unavailable",
            ErrorCode::SourceFailed => "Data source failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create an InvalidRange error listing the accepted values.
    pub fn invalid_range(field: &str, accepted: &[&str]) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Field '{}' must be one of: {}", field, accepted.join(", ")),
        )
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    pub fn section_not_found(section: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::SectionNotFound,
            format!("Section '{}' not found", section),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn cache_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CacheUnavailable, message)
    }

    pub fn source_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SourceFailed, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        tracing::warn!(error = %err, "cache store error");
        ApiError::cache_unavailable(err.to_string())
    }
}

impl From<AggregationError> for ApiError {
    fn from(err: AggregationError) -> Self {
        match err {
            AggregationError::InvalidRange { value } => ApiError::invalid_range(
                "range",
                &academy_core::ChartRange::ALL.map(|r| r.param()),
            )
            .with_details(serde_json::json!({ "value": value })),
            other => {
                tracing::error!(error = %other, "aggregation error");
                ApiError::source_failed(other.to_string())
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(err.to_string())
    }
}

impl From<AcademyError> for ApiError {
    fn from(err: AcademyError) -> Self {
        match err {
            AcademyError::Cache(e) => e.into(),
            AcademyError::Aggregation(e) => e.into(),
            AcademyError::Config(e) => e.into(),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::InvalidRange.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::SectionNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::CacheUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_api_error_constructors() {
        let err = ApiError::section_not_found("pricing");
        assert_eq!(err.code, ErrorCode::SectionNotFound);
        assert!(err.message.contains("pricing"));

        let err = ApiError::invalid_format("limit", "a positive integer");
        assert_eq!(err.code, ErrorCode::InvalidFormat);
        assert!(err.message.contains("limit"));
    }

    #[test]
    fn test_invalid_range_lists_accepted_values() {
        let err = ApiError::from(AggregationError::InvalidRange {
            value: "3m".to_string(),
        });
        assert_eq!(err.code, ErrorCode::InvalidRange);
        assert!(err.message.contains("4w, 1m, 6m, 12m"));
        assert_eq!(err.details, Some(serde_json::json!({"value": "3m"})));
    }

    #[test]
    fn test_academy_error_conversion() {
        let err = ApiError::from(AcademyError::from(CacheError::unavailable("down")));
        assert_eq!(err.code, ErrorCode::CacheUnavailable);

        let err = ApiError::from(AcademyError::from(ConfigError::MissingRequired {
            field: "ACADEMY_JWT_SECRET".to_string(),
        }));
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::unauthorized("Login required");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("UNAUTHORIZED"));
        assert!(json.contains("Login required"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::source_failed("learner query timed out");
        let display = format!("{}", err);

        assert!(display.contains("SourceFailed"));
        assert!(display.contains("learner query timed out"));
    }
}
