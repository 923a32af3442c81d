//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::http::HeaderValue;
use axum::http::header::RETRY_AFTER;
use axum::response::{IntoResponse, Response};
use domain::RepositoryError;
use saga::SagaError;
use sequence::SequenceError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Order lifecycle or stock error.
    Saga(SagaError),
    /// Sequence numbering error.
    Sequence(SequenceError),
    /// Unexpected server-side failure.
    Internal(String),
}

/// Seconds a client should wait before retrying a contended request.
const RETRY_AFTER_SECS: HeaderValue = HeaderValue::from_static("1");

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retryable = matches!(&self, ApiError::Sequence(err) if err.is_retryable());
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Sequence(err) => sequence_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, code, error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message, "code": code });
        let mut response = (status, axum::Json(body)).into_response();
        if retryable {
            response.headers_mut().insert(RETRY_AFTER, RETRY_AFTER_SECS);
        }
        response
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, &'static str, String) {
    let (status, code) = match &err {
        SagaError::Validation(_) | SagaError::ReferenceRequired => {
            (StatusCode::BAD_REQUEST, "validation_error")
        }
        SagaError::NotFound(_) => (StatusCode::NOT_FOUND, "order_not_found"),
        SagaError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_order_state"),
        SagaError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
        SagaError::InsufficientReservedStock { .. } => {
            (StatusCode::CONFLICT, "insufficient_reserved_stock")
        }
        SagaError::Stock { .. } => (StatusCode::BAD_GATEWAY, "stock_service_error"),
        SagaError::Cancelled { .. } => (StatusCode::REQUEST_TIMEOUT, "cancelled"),
        SagaError::PersistenceFailed { source, .. } => match source {
            RepositoryError::StatusConflict { .. } => {
                (StatusCode::CONFLICT, "invalid_order_state")
            }
            RepositoryError::NotFound(_) => (StatusCode::NOT_FOUND, "order_not_found"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failed"),
        },
        SagaError::Unreconciled { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "unreconciled"),
        SagaError::Repository(RepositoryError::Duplicate(_)) => {
            (StatusCode::CONFLICT, "duplicate_order")
        }
        SagaError::Repository(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
    };
    (status, code, err.to_string())
}

fn sequence_error_to_response(err: SequenceError) -> (StatusCode, &'static str, String) {
    let (status, code) = match &err {
        SequenceError::DocumentTypeRequired => (StatusCode::BAD_REQUEST, "validation_error"),
        SequenceError::NotFound(_) => (StatusCode::NOT_FOUND, "sequence_not_found"),
        SequenceError::Contention { .. } => (StatusCode::SERVICE_UNAVAILABLE, "sequence_contention"),
        SequenceError::Exhausted(_) => (StatusCode::INTERNAL_SERVER_ERROR, "sequence_exhausted"),
        SequenceError::Database(_) | SequenceError::Migration(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
        }
    };
    (status, code, err.to_string())
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<SequenceError> for ApiError {
    fn from(err: SequenceError) -> Self {
        ApiError::Sequence(err)
    }
}
