//! Error types for the hook/event ingestor.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application error type, scoped to the surfaces guardrail actually
/// exposes: approval lookups, config loading, and persistence failures
/// that must still reach the caller as a 5xx rather than being swallowed.
#[derive(Debug, Error)]
pub enum AppError {
    /// Validation error (malformed hook/approval request body).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Resource not found (unknown approval id).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Pending approval was already resolved.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (persistence failure, unexpected panic
    /// boundary).
    #[error("Internal error: {0}")]
    Internal(String),

    /// Bad request (unparseable config, malformed query params).
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
            Self::BadRequest(_) => "bad_request",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail { code: self.error_code().to_string(), message: self.to_string() },
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<guardrail_store::StoreError> for AppError {
    fn from(error: guardrail_store::StoreError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<guardrail_core::ApprovalError> for AppError {
    fn from(error: guardrail_core::ApprovalError) -> Self {
        match error {
            guardrail_core::ApprovalError::NotFound(id) => Self::NotFound(format!("approval {id}")),
            guardrail_core::ApprovalError::AlreadyResolved(id) => Self::Conflict(format!("approval {id} already resolved")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn approval_error_conversions() {
        let id = uuid::Uuid::new_v4();
        let err: AppError = guardrail_core::ApprovalError::NotFound(id).into();
        assert!(matches!(err, AppError::NotFound(_)));
        let err: AppError = guardrail_core::ApprovalError::AlreadyResolved(id).into();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
