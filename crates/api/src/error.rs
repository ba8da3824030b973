//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use event_buffer::EventBufferError;
use event_store::EventStoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Command rejected or failed in the domain layer.
    Domain(DomainError),
    /// Parking or releasing an event failed.
    Buffer(EventBufferError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Buffer(err) => buffer_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Status code for a domain error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::InvalidType => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict { .. } | ErrorKind::Precondition => StatusCode::CONFLICT,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = status_for(err.kind());
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "command failed");
    }
    (status, err.to_string())
}

fn buffer_error_to_response(err: EventBufferError) -> (StatusCode, String) {
    match err {
        EventBufferError::NotParked(_) => (StatusCode::NOT_FOUND, err.to_string()),
        EventBufferError::Domain(inner) => domain_error_to_response(inner),
        EventBufferError::Store(msg) => {
            tracing::error!(error = %msg, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<EventBufferError> for ApiError {
    fn from(err: EventBufferError) -> Self {
        match err {
            EventBufferError::Store(_) => ApiError::Internal(err.to_string()),
            other => ApiError::Buffer(other),
        }
    }
}

impl From<EventStoreError> for ApiError {
    fn from(err: EventStoreError) -> Self {
        ApiError::Domain(DomainError::EventStore(err))
    }
}
