//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP responses.
//! All errors implement `IntoResponse` to provide consistent error formatting.

use crate::orchestration::OrchestrationError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// Each variant implements automatic conversion to HTTP responses via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Record with the given ID was not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Flow lifecycle operation failed
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    /// Record store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Orchestration(e) => match e {
                OrchestrationError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
                OrchestrationError::DuplicateInstance(_) => StatusCode::CONFLICT,
                OrchestrationError::InstanceNotFound(_) => StatusCode::NOT_FOUND,
                OrchestrationError::EngineUnreachable(_)
                | OrchestrationError::UpstreamDependencyMissing(_)
                | OrchestrationError::EngineRejected(_) => StatusCode::BAD_GATEWAY,
            },
            AppError::Store(StoreError::InvalidPatch(_)) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::RecordNotFound("x".into()), StatusCode::NOT_FOUND),
            (
                OrchestrationError::InvalidConfiguration("x".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                OrchestrationError::DuplicateInstance("x".into()).into(),
                StatusCode::CONFLICT,
            ),
            (
                OrchestrationError::InstanceNotFound("x".into()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                OrchestrationError::EngineUnreachable("x".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                OrchestrationError::UpstreamDependencyMissing("x".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                StoreError::InvalidPatch("x".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{}", error);
        }
    }

    #[test]
    fn test_orchestration_message_is_transparent() {
        let error: AppError = OrchestrationError::DuplicateInstance("up:abc123".into()).into();
        assert_eq!(error.to_string(), "Flow instance already exists: up:abc123");
    }
}
