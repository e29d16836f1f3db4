//! Client-facing error responses.
//!
//! Every rejection is rendered as `{"error": {"code", "message"}}` with a
//! stable code so clients can branch without parsing messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_core::CoreError;
use relay_delivery::QueueError;
use serde::Serialize;
use thiserror::Error;

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable error code (E1001, E3001-E3004)
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Reasons an ingest request is rejected.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Body is not valid JSON, misses a field, or has an empty field.
    #[error("[E1001] Invalid payload: {0}")]
    InvalidPayload(String),

    /// Event ID could not be generated.
    #[error("[E3001] Event mapping failed: {0}")]
    Mapping(String),

    /// The relay is shutting down and no longer accepts events.
    #[error("[E3002] Event queue is closed")]
    QueueClosed,

    /// No queue slot freed up within the enqueue timeout.
    #[error("[E3003] Event queue is full")]
    QueueFull,

    /// The request was cancelled while waiting for a queue slot.
    #[error("[E3004] Enqueue cancelled")]
    EnqueueCancelled,
}

impl ApiError {
    /// Returns the stable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "E1001",
            Self::Mapping(_) => "E3001",
            Self::QueueClosed => "E3002",
            Self::QueueFull => "E3003",
            Self::EnqueueCancelled => "E3004",
        }
    }

    /// HTTP status the error is reported with.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::Mapping(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::QueueClosed | Self::QueueFull | Self::EnqueueCancelled => {
                StatusCode::SERVICE_UNAVAILABLE
            },
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::InvalidPayload { message } => Self::InvalidPayload(message),
            CoreError::Mapping(cause) => Self::Mapping(cause.to_string()),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::Closed => Self::QueueClosed,
            QueueError::Cancelled => Self::EnqueueCancelled,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorDetail { code: self.code().to_string(), message: self.to_string() },
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use relay_core::IdGenerationError;

    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(ApiError::InvalidPayload("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Mapping("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::QueueClosed.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::QueueFull.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::EnqueueCancelled.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn core_and_queue_errors_convert() {
        let mapping = ApiError::from(CoreError::from(IdGenerationError::new("no entropy")));
        assert_eq!(mapping.code(), "E3001");

        assert_eq!(ApiError::from(QueueError::Closed).code(), "E3002");
        assert_eq!(ApiError::from(QueueError::Cancelled).code(), "E3004");
    }
}
