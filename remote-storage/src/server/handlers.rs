//! HTTP route handlers for the remote storage server.
//!
//! Read and write bodies are snappy-compressed protobuf, as sent by
//! Prometheus. Every request gets its own cancellation token, which is
//! cancelled when the client goes away (the handler future is dropped) or
//! when the request timeout elapses.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use tokio_util::sync::CancellationToken;

use super::error::ApiError;
use super::metrics::Metrics;
use super::request::WriteRequest;
use super::response::SnappyProtobuf;
use crate::adapter::{RemoteStorageAdapter, WriteStats};
use crate::error::{Error, Result};
use crate::storage::StorageError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub adapter: Arc<RemoteStorageAdapter>,
    pub metrics: Arc<Metrics>,
    pub request_timeout: Duration,
}

/// Runs `fut` under the request deadline, cancelling `cancel` if it elapses.
async fn with_deadline<T>(
    timeout: Duration,
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            tracing::warn!("Request timed out after {:?}", timeout);
            Err(Error::Storage(StorageError::Cancelled))
        }
    }
}

fn log_failure(path: &str, err: &Error) {
    if err.is_client_fault() {
        tracing::warn!("Rejected {} request: {}", path, err);
    } else {
        tracing::error!("Failed {} request: {}", path, err);
    }
}

/// Handle POST /api/v1/read
pub async fn handle_read(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<SnappyProtobuf, ApiError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let result = with_deadline(
        state.request_timeout,
        &cancel,
        state.adapter.read(&body, &cancel),
    )
    .await;

    match result {
        Ok((body, stats)) => {
            state
                .metrics
                .remote_read_queries_total
                .inc_by(stats.queries as u64);
            state
                .metrics
                .remote_read_series_total
                .inc_by(stats.series as u64);
            state
                .metrics
                .remote_read_samples_total
                .inc_by(stats.samples as u64);
            Ok(SnappyProtobuf(body))
        }
        Err(err) => {
            log_failure("read", &err);
            state.metrics.record_error("read", err.kind());
            Err(ApiError(err))
        }
    }
}

/// Handle POST /api/v1/write
///
/// Returns 204 No Content once the whole batch has been handed to storage.
pub async fn handle_write(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<StatusCode, ApiError> {
    let request = match WriteRequest::from_body(&body) {
        Ok(request) => request,
        Err(err) => {
            log_failure("write", &err);
            state.metrics.record_error("write", err.kind());
            return Err(ApiError(err));
        }
    };
    let stats = WriteStats::of(&request);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let result = with_deadline(
        state.request_timeout,
        &cancel,
        state.adapter.write_request(request, &cancel),
    )
    .await;

    match result {
        Ok(stats) => {
            state
                .metrics
                .remote_write_series_total
                .inc_by(stats.series as u64);
            state
                .metrics
                .remote_write_samples_ingested_total
                .inc_by(stats.samples as u64);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => {
            log_failure("write", &err);
            state.metrics.record_error("write", err.kind());
            state
                .metrics
                .remote_write_samples_failed_total
                .inc_by(stats.samples as u64);
            Err(ApiError(err))
        }
    }
}

/// Handle GET /metrics
pub async fn handle_metrics(State(state): State<AppState>) -> String {
    state.metrics.encode()
}

/// Handle GET /-/healthy
pub async fn handle_healthy() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Handle GET /-/ready
pub async fn handle_ready() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
