// src/errors.rs
// DOCUMENTATION: Custom error types and HTTP responses
// PURPOSE: Centralized error handling for entire application

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

/// Application-specific error types
/// DOCUMENTATION: One enum for every failure the directory can surface.
/// Each variant maps to an HTTP status code and a JSON error body.
#[derive(Error, Debug)]
pub enum FarmError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Illegal lifecycle transition (e.g. approving an already rejected photo)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Forbidden access")]
    Forbidden,

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service temporarily unavailable: {0}")]
    ServiceUnavailable(String),
}

impl FarmError {
    /// Transient upstream failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FarmError::ExternalApiError(_) | FarmError::ServiceUnavailable(_)
        )
    }

    fn code(&self) -> &'static str {
        match self {
            FarmError::NotFound(_) => "NOT_FOUND",
            FarmError::AlreadyExists(_) => "ALREADY_EXISTS",
            FarmError::Conflict(_) => "CONFLICT",
            FarmError::DatabaseError(_) => "DATABASE_ERROR",
            FarmError::InvalidInput(_) => "INVALID_INPUT",
            FarmError::ValidationError(_) => "VALIDATION_ERROR",
            FarmError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            FarmError::Unauthorized => "UNAUTHORIZED",
            FarmError::Forbidden => "FORBIDDEN",
            FarmError::InternalError(_) => "INTERNAL_ERROR",
            FarmError::ExternalApiError(_) => "EXTERNAL_API_ERROR",
            FarmError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            FarmError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

/// Convert FarmError to HTTP response
/// DOCUMENTATION: Maps error types to HTTP status codes and JSON responses
impl ResponseError for FarmError {
    fn error_response(&self) -> HttpResponse {
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        });

        HttpResponse::build(self.status_code()).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            FarmError::NotFound(_) => StatusCode::NOT_FOUND,
            FarmError::AlreadyExists(_) => StatusCode::CONFLICT,
            FarmError::Conflict(_) => StatusCode::CONFLICT,
            FarmError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FarmError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FarmError::ValidationError(_) => StatusCode::BAD_REQUEST,
            FarmError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            FarmError::Unauthorized => StatusCode::UNAUTHORIZED,
            FarmError::Forbidden => StatusCode::FORBIDDEN,
            FarmError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FarmError::ExternalApiError(_) => StatusCode::BAD_GATEWAY,
            FarmError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            FarmError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            FarmError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            FarmError::RateLimitExceeded.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            FarmError::PayloadTooLarge("big".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_retryable_variants() {
        assert!(FarmError::ExternalApiError("502".into()).is_retryable());
        assert!(FarmError::ServiceUnavailable("down".into()).is_retryable());
        assert!(!FarmError::NotFound("farm".into()).is_retryable());
        assert!(!FarmError::RateLimitExceeded.is_retryable());
    }

    #[test]
    fn test_error_body_shape() {
        let resp = FarmError::NotFound("farm abc".into()).error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
