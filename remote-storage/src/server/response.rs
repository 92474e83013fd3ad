//! Encoding of read results into the remote read response.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::proto;
use crate::model::{SeriesSet, SeriesStream};

/// Content type for binary protobuf, as sent by Prometheus.
pub(super) const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

/// Content encoding for snappy block compression.
pub(super) const CONTENT_ENCODING_SNAPPY: &str = "snappy";

/// Converts backend results into a [`proto::ReadResponse`].
///
/// Results keep the order of the queries they answer and series keep the
/// order the backend returned them in. Labels are emitted sorted by name, so
/// the same results always encode to the same bytes.
pub fn to_proto_response(results: Vec<SeriesSet>) -> proto::ReadResponse {
    proto::ReadResponse {
        results: results
            .into_iter()
            .map(|set| proto::QueryResult {
                timeseries: set.into_iter().map(to_proto_series).collect(),
            })
            .collect(),
    }
}

fn to_proto_series(stream: SeriesStream) -> proto::TimeSeries {
    proto::TimeSeries {
        labels: stream
            .labels
            .into_iter()
            .map(|(name, value)| proto::Label::new(name, value))
            .collect(),
        samples: stream
            .samples
            .into_iter()
            .map(|s| proto::Sample {
                value: s.value,
                timestamp: s.timestamp,
            })
            .collect(),
    }
}

/// A snappy-compressed protobuf response body.
pub struct SnappyProtobuf(pub Vec<u8>);

impl IntoResponse for SnappyProtobuf {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, CONTENT_TYPE_PROTOBUF),
                (header::CONTENT_ENCODING, CONTENT_ENCODING_SNAPPY),
            ],
            self.0,
        )
            .into_response()
    }
}
