//! Prometheus metrics for the remote storage server.

use axum::http::Method;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Labels for HTTP request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabelsWithStatus {
    pub method: HttpMethod,
    pub endpoint: String,
    pub status: u16,
}

/// HTTP method label value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum HttpMethod {
    Get,
    Post,
    Other,
}

impl From<&Method> for HttpMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => HttpMethod::Get,
            Method::POST => HttpMethod::Post,
            _ => HttpMethod::Other,
        }
    }
}

/// Labels for the HTTP latency histogram.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: HttpMethod,
    pub endpoint: String,
}

/// Labels for failed remote requests.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    /// Which path failed, `read` or `write`.
    pub path: &'static str,
    /// Short error classification, see [`crate::Error::kind`].
    pub kind: &'static str,
}

/// Container for all Prometheus metrics.
pub struct Metrics {
    registry: Registry,

    /// Counter of queries served through remote read.
    pub remote_read_queries_total: Counter,

    /// Counter of series returned by remote read.
    pub remote_read_series_total: Counter,

    /// Counter of samples returned by remote read.
    pub remote_read_samples_total: Counter,

    /// Counter of series accepted through remote write.
    pub remote_write_series_total: Counter,

    /// Counter of samples handed to storage through remote write.
    pub remote_write_samples_ingested_total: Counter,

    /// Counter of samples in valid write requests that storage failed to accept.
    pub remote_write_samples_failed_total: Counter,

    /// Counter of failed remote requests by path and kind.
    pub remote_request_errors_total: Family<ErrorLabels, Counter>,

    /// Counter of HTTP requests.
    pub http_requests_total: Family<HttpLabelsWithStatus, Counter>,

    /// Histogram of HTTP request latency in seconds.
    pub http_request_duration_seconds: Family<HttpLabels, Histogram>,

    /// Gauge of currently in-flight requests.
    pub http_requests_in_flight: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics registry with all metrics registered.
    ///
    /// Counters are registered without the `_total` suffix, which the
    /// encoder appends to every counter sample.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let remote_read_queries_total = Counter::default();
        registry.register(
            "remote_read_queries",
            "Total number of queries served through remote read",
            remote_read_queries_total.clone(),
        );

        let remote_read_series_total = Counter::default();
        registry.register(
            "remote_read_series",
            "Total number of series returned by remote read",
            remote_read_series_total.clone(),
        );

        let remote_read_samples_total = Counter::default();
        registry.register(
            "remote_read_samples",
            "Total number of samples returned by remote read",
            remote_read_samples_total.clone(),
        );

        let remote_write_series_total = Counter::default();
        registry.register(
            "remote_write_series",
            "Total number of series accepted through remote write",
            remote_write_series_total.clone(),
        );

        let remote_write_samples_ingested_total = Counter::default();
        registry.register(
            "remote_write_samples_ingested",
            "Total number of samples written to storage",
            remote_write_samples_ingested_total.clone(),
        );

        let remote_write_samples_failed_total = Counter::default();
        registry.register(
            "remote_write_samples_failed",
            "Total number of samples storage failed to accept",
            remote_write_samples_failed_total.clone(),
        );

        let remote_request_errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "remote_request_errors",
            "Total number of failed remote read and write requests",
            remote_request_errors_total.clone(),
        );

        let http_requests_total = Family::<HttpLabelsWithStatus, Counter>::default();
        registry.register(
            "http_requests",
            "Total number of HTTP requests",
            http_requests_total.clone(),
        );

        // buckets from 1ms to ~8s
        let http_request_duration_seconds =
            Family::<HttpLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 14))
            });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
            http_request_duration_seconds.clone(),
        );

        let http_requests_in_flight = Gauge::default();
        registry.register(
            "http_requests_in_flight",
            "Number of HTTP requests currently being processed",
            http_requests_in_flight.clone(),
        );

        Self {
            registry,
            remote_read_queries_total,
            remote_read_series_total,
            remote_read_samples_total,
            remote_write_series_total,
            remote_write_samples_ingested_total,
            remote_write_samples_failed_total,
            remote_request_errors_total,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
        }
    }

    /// Records a failed remote request.
    pub fn record_error(&self, path: &'static str, kind: &'static str) {
        self.remote_request_errors_total
            .get_or_create(&ErrorLabels { path, kind })
            .inc();
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = prometheus_client::encoding::text::encode(&mut buffer, &self.registry) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        buffer
    }
}
