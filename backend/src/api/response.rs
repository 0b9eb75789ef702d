//! Response envelope

use axum::http::StatusCode;
use serde::Serialize;

/// Success envelope returned by every record endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Payload
    pub data: T,
    /// HTTP status code, repeated in the body
    pub code: u16,
    /// Human-readable message
    pub message: String,
}

impl<T> ApiResponse<T> {
    /// `200 OK` envelope
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, data, message)
    }

    /// Envelope carrying an explicit status
    pub fn with_status(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            code: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Query string accepted by list endpoints
#[derive(Debug, Default, serde::Deserialize)]
pub struct ListQuery {
    /// Only return records of this site
    pub site: Option<String>,
}
