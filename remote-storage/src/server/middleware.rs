//! HTTP middleware recording request metrics.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{MatchedPath, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use super::metrics::{HttpLabels, HttpLabelsWithStatus, HttpMethod, Metrics};

/// Records count, latency and in-flight gauge for every request.
///
/// Requests are labelled with the matched route template rather than the raw
/// URI, so unknown paths collapse into a single `unmatched` series.
pub async fn track_http_metrics(
    State(metrics): State<Arc<Metrics>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let method = HttpMethod::from(req.method());
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    metrics.http_requests_in_flight.inc();
    let start = Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed().as_secs_f64();
    metrics.http_requests_in_flight.dec();
    metrics
        .http_request_duration_seconds
        .get_or_create(&HttpLabels {
            method: method.clone(),
            endpoint: endpoint.clone(),
        })
        .observe(elapsed);
    metrics
        .http_requests_total
        .get_or_create(&HttpLabelsWithStatus {
            method,
            endpoint: endpoint.clone(),
            status: response.status().as_u16(),
        })
        .inc();

    tracing::debug!(
        endpoint = %endpoint,
        status = response.status().as_u16(),
        elapsed_secs = elapsed,
        "request completed"
    );
    response
}
