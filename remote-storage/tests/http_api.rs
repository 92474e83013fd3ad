//! End-to-end tests for the remote read/write HTTP API.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use remote_storage::server::proto;
use remote_storage::server::{RemoteStorageServer, ServerConfig, codec};
use remote_storage::{
    Config, InMemoryStorage, Query, STALE_NAN_BITS, SeriesSet, Storage, StorageError,
    StorageResult,
};

fn router_with(storage: Arc<dyn Storage>, config: Config) -> Router {
    RemoteStorageServer::new(storage, ServerConfig { port: 0, config }).router()
}

fn router() -> (Router, Arc<InMemoryStorage>) {
    let storage = Arc::new(InMemoryStorage::new());
    (router_with(storage.clone(), Config::default()), storage)
}

fn series(labels: &[(&'static str, &'static str)], samples: &[(i64, f64)]) -> proto::TimeSeries {
    proto::TimeSeries {
        labels: labels
            .iter()
            .map(|&(n, v)| proto::Label::new(n, v))
            .collect(),
        samples: samples
            .iter()
            .map(|&(timestamp, value)| proto::Sample { value, timestamp })
            .collect(),
    }
}

fn eq(name: &str, value: &str) -> proto::LabelMatcher {
    proto::LabelMatcher {
        r#type: proto::MatcherType::Eq as i32,
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn query(start: i64, end: i64, matchers: Vec<proto::LabelMatcher>) -> proto::Query {
    proto::Query {
        start_timestamp_ms: start,
        end_timestamp_ms: end,
        matchers,
    }
}

fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-protobuf")
        .header(header::CONTENT_ENCODING, "snappy")
        .body(Body::from(body))
        .unwrap()
}

fn write_request(timeseries: Vec<proto::TimeSeries>) -> Request<Body> {
    post(
        "/api/v1/write",
        codec::encode(&proto::WriteRequest { timeseries }).unwrap(),
    )
}

fn read_request(queries: Vec<proto::Query>) -> Request<Body> {
    post(
        "/api/v1/read",
        codec::encode(&proto::ReadRequest { queries }).unwrap(),
    )
}

async fn body_bytes(response: axum::response::Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn error_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn should_read_back_written_series() {
    // given
    let (app, _) = router();
    let write = write_request(vec![
        series(
            &[("__name__", "up"), ("job", "node")],
            &[(1000, 1.0), (2000, 0.0)],
        ),
        series(&[("__name__", "up"), ("job", "api")], &[(1000, 1.0)]),
    ]);

    // when
    let write_response = app.clone().oneshot(write).await.unwrap();
    let read_response = app
        .oneshot(read_request(vec![query(
            0,
            1500,
            vec![eq("__name__", "up"), eq("job", "node")],
        )]))
        .await
        .unwrap();

    // then
    assert_eq!(write_response.status(), StatusCode::NO_CONTENT);
    assert_eq!(read_response.status(), StatusCode::OK);
    let decoded: proto::ReadResponse = codec::decode(&body_bytes(read_response).await).unwrap();
    assert_eq!(decoded.results.len(), 1);
    assert_eq!(
        decoded.results[0].timeseries,
        vec![series(&[("__name__", "up"), ("job", "node")], &[(1000, 1.0)])]
    );
}

#[tokio::test]
async fn should_set_read_response_headers() {
    // given
    let (app, _) = router();

    // when
    let response = app
        .oneshot(read_request(vec![query(0, 10, vec![eq("__name__", "up")])]))
        .await
        .unwrap();

    // then
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-protobuf"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).unwrap(),
        "snappy"
    );
}

#[tokio::test]
async fn should_answer_every_query_in_order() {
    // given
    let (app, _) = router();
    app.clone()
        .oneshot(write_request(vec![
            series(&[("__name__", "a")], &[(1, 1.0)]),
            series(&[("__name__", "c")], &[(1, 3.0)]),
        ]))
        .await
        .unwrap();

    // when
    let response = app
        .oneshot(read_request(vec![
            query(0, 10, vec![eq("__name__", "c")]),
            query(0, 10, vec![eq("__name__", "missing")]),
            query(0, 10, vec![eq("__name__", "a")]),
        ]))
        .await
        .unwrap();

    // then
    let decoded: proto::ReadResponse = codec::decode(&body_bytes(response).await).unwrap();
    assert_eq!(decoded.results.len(), 3);
    assert_eq!(decoded.results[0].timeseries[0].samples[0].value, 3.0);
    assert!(decoded.results[1].timeseries.is_empty());
    assert_eq!(decoded.results[2].timeseries[0].samples[0].value, 1.0);
}

#[tokio::test]
async fn should_preserve_stale_marker_bits() {
    // given
    let (app, _) = router();
    let stale = f64::from_bits(STALE_NAN_BITS);
    app.clone()
        .oneshot(write_request(vec![series(
            &[("__name__", "up")],
            &[(1000, stale)],
        )]))
        .await
        .unwrap();

    // when
    let response = app
        .oneshot(read_request(vec![query(0, 2000, vec![eq("__name__", "up")])]))
        .await
        .unwrap();

    // then
    let decoded: proto::ReadResponse = codec::decode(&body_bytes(response).await).unwrap();
    let value = decoded.results[0].timeseries[0].samples[0].value;
    assert_eq!(value.to_bits(), STALE_NAN_BITS);
}

#[tokio::test]
async fn should_reject_query_with_only_empty_matchers() {
    // given
    let (app, _) = router();

    // when
    let response = app
        .oneshot(read_request(vec![query(0, 10, vec![eq("job", "")])]))
        .await
        .unwrap();

    // then
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = error_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["errorType"], "bad_data");
}

#[tokio::test]
async fn should_reject_unknown_matcher_type() {
    // given
    let (app, _) = router();
    let mut matcher = eq("__name__", "up");
    matcher.r#type = 7;

    // when
    let response = app
        .oneshot(read_request(vec![query(0, 10, vec![matcher])]))
        .await
        .unwrap();

    // then
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_whole_batch_with_one_invalid_label() {
    // given
    let (app, storage) = router();
    let write = write_request(vec![
        series(&[("__name__", "up")], &[(1000, 1.0)]),
        series(&[("__name__", "up"), ("bad-name", "x")], &[(1000, 1.0)]),
    ]);

    // when
    let response = app.oneshot(write).await.unwrap();

    // then
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(storage.series_count().await, 0);
}

#[tokio::test]
async fn should_reject_invalid_utf8_label_value() {
    // given
    let (app, storage) = router();
    let mut ts = series(&[("__name__", "up")], &[(1000, 1.0)]);
    ts.labels
        .push(proto::Label::new("job", Bytes::from_static(&[0xff, 0xfe])));

    // when
    let response = app.oneshot(write_request(vec![ts])).await.unwrap();

    // then
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(storage.series_count().await, 0);
}

#[tokio::test]
async fn should_reject_body_that_is_not_snappy() {
    // given
    let (app, _) = router();

    // when
    let response = app
        .oneshot(post("/api/v1/write", b"definitely not snappy".to_vec()))
        .await
        .unwrap();

    // then
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_body_over_size_limit() {
    // given
    let storage = Arc::new(InMemoryStorage::new());
    let config = Config {
        max_request_body_bytes: 16,
        ..Config::default()
    };
    let app = router_with(storage, config);
    let write = write_request(vec![series(
        &[("__name__", "a_rather_long_metric_name"), ("job", "node")],
        &[(1000, 1.0)],
    )]);

    // when
    let response = app.oneshot(write).await.unwrap();

    // then
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

/// Fails every call with a fixed error.
struct FailingStorage(StorageError);

#[async_trait]
impl Storage for FailingStorage {
    async fn read(&self, _: &CancellationToken, _: &[Query]) -> StorageResult<Vec<SeriesSet>> {
        Err(self.0.clone())
    }

    async fn write(&self, _: &CancellationToken, _: SeriesSet) -> StorageResult<()> {
        Err(self.0.clone())
    }
}

#[tokio::test]
async fn should_return_500_when_storage_fails() {
    // given
    let storage = Arc::new(FailingStorage(StorageError::Internal("disk full".into())));
    let app = router_with(storage, Config::default());

    // when
    let response = app
        .oneshot(write_request(vec![series(&[("__name__", "up")], &[(1, 1.0)])]))
        .await
        .unwrap();

    // then
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = error_json(response).await;
    assert_eq!(json["errorType"], "internal");
}

/// Blocks until the request is cancelled.
struct BlockingStorage;

#[async_trait]
impl Storage for BlockingStorage {
    async fn read(&self, cancel: &CancellationToken, _: &[Query]) -> StorageResult<Vec<SeriesSet>> {
        cancel.cancelled().await;
        Err(StorageError::Cancelled)
    }

    async fn write(&self, cancel: &CancellationToken, _: SeriesSet) -> StorageResult<()> {
        cancel.cancelled().await;
        Err(StorageError::Cancelled)
    }
}

#[tokio::test]
async fn should_return_503_when_request_times_out() {
    // given
    let storage = Arc::new(BlockingStorage);
    let config = Config {
        request_timeout_secs: 1,
        ..Config::default()
    };
    let app = router_with(storage, config);

    // when
    let response = app
        .oneshot(read_request(vec![query(0, 10, vec![eq("__name__", "up")])]))
        .await
        .unwrap();

    // then
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = error_json(response).await;
    assert_eq!(json["errorType"], "unavailable");
}

#[tokio::test]
async fn should_serve_health_endpoints() {
    // given
    let (app, _) = router();

    // when
    let healthy = app
        .clone()
        .oneshot(Request::get("/-/healthy").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let ready = app
        .oneshot(Request::get("/-/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    // then
    assert_eq!(healthy.status(), StatusCode::OK);
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn should_expose_request_metrics() {
    // given
    let (app, _) = router();
    app.clone()
        .oneshot(write_request(vec![series(
            &[("__name__", "up")],
            &[(1, 1.0), (2, 1.0)],
        )]))
        .await
        .unwrap();
    app.clone()
        .oneshot(write_request(vec![series(&[("9bad", "x")], &[(1, 1.0)])]))
        .await
        .unwrap();

    // when
    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    // then
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(text.contains("remote_write_samples_ingested_total 2"));
    assert!(text.contains("remote_write_series_total 1"));
    assert!(
        text.contains(r#"remote_request_errors_total{path="write",kind="invalid_label_name"} 1"#)
    );
    assert!(text.contains(r#"endpoint="/api/v1/write""#));
}
