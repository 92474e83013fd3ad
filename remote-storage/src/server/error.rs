//! Mapping of adapter errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::Error;
use crate::storage::StorageError;

/// Error response wrapper for converting [`Error`] to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    /// Status code and error type reported for the wrapped error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            e if e.is_client_fault() => (StatusCode::BAD_REQUEST, "bad_data"),
            Error::Storage(StorageError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();

        let body = serde_json::json!({
            "status": "error",
            "errorType": error_type,
            "error": self.0.to_string()
        });

        (status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}
