//! Translation of remote read/write requests into the internal model.
//!
//! Both request types are parsed with `from_body`, which decodes the snappy
//! protobuf payload and then validates and translates it. Any failure rejects
//! the whole request, so the storage backend only ever sees fully valid input.

use super::codec;
use super::proto;
use crate::error::{Error, Result};
use crate::model::{
    LabelSet, METRIC_NAME_LABEL, MatchOp, Matcher, Query, Sample, SeriesSet, SeriesStream,
    TimeRange, is_valid_label_name, is_valid_metric_name,
};

/// Maps a wire matcher type code to a [`MatchOp`].
pub fn match_op(code: i32) -> Result<MatchOp> {
    match proto::MatcherType::try_from(code) {
        Ok(proto::MatcherType::Eq) => Ok(MatchOp::Equal),
        Ok(proto::MatcherType::Neq) => Ok(MatchOp::NotEqual),
        Ok(proto::MatcherType::Re) => Ok(MatchOp::RegexMatch),
        Ok(proto::MatcherType::Nre) => Ok(MatchOp::RegexNotMatch),
        Err(_) => Err(Error::UnknownMatcherType(code)),
    }
}

/// A decoded and validated remote read request.
#[derive(Debug)]
pub struct ReadRequest {
    /// Queries in request order.
    pub queries: Vec<Query>,
}

impl ReadRequest {
    /// Parse a read request from a snappy-compressed protobuf body.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let proto_request: proto::ReadRequest = codec::decode(body)?;
        Self::from_proto_request(proto_request)
    }

    /// Convert a proto ReadRequest into internal queries.
    pub fn from_proto_request(proto_request: proto::ReadRequest) -> Result<Self> {
        let queries = proto_request
            .queries
            .into_iter()
            .enumerate()
            .map(|(i, q)| translate_query(i, q))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { queries })
    }
}

fn translate_query(index: usize, query: proto::Query) -> Result<Query> {
    let mut empty = true;
    let mut matchers = Vec::with_capacity(query.matchers.len());
    for m in query.matchers {
        let op = match_op(m.r#type)?;
        if !m.value.is_empty() {
            empty = false;
        }
        matchers.push(Matcher::new(op, m.name, m.value));
    }

    if empty {
        return Err(Error::EmptyMatcherSet(index));
    }

    Ok(Query {
        range: TimeRange::new(query.start_timestamp_ms, query.end_timestamp_ms),
        matchers,
    })
}

/// A decoded and validated remote write request.
#[derive(Debug)]
pub struct WriteRequest {
    /// Series in request order.
    pub series: SeriesSet,
}

impl WriteRequest {
    /// Parse a write request from a snappy-compressed protobuf body.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let proto_request: proto::WriteRequest = codec::decode(body)?;
        Self::from_proto_request(proto_request)
    }

    /// Convert a proto WriteRequest into internal series.
    pub fn from_proto_request(proto_request: proto::WriteRequest) -> Result<Self> {
        let series = proto_request
            .timeseries
            .into_iter()
            .map(translate_series)
            .collect::<Result<SeriesSet>>()?;
        Ok(Self { series })
    }

    /// Total number of samples across all series.
    pub fn sample_count(&self) -> usize {
        self.series.iter().map(|s| s.samples.len()).sum()
    }
}

fn translate_series(ts: proto::TimeSeries) -> Result<SeriesStream> {
    let mut labels = LabelSet::new();
    for label in &ts.labels {
        let name = label_name(&label.name)?;
        let value = label_value(name, &label.value)?;
        labels.insert(name, value);
    }

    let samples = ts
        .samples
        .iter()
        .map(|s| Sample::new(s.timestamp, s.value))
        .collect();

    Ok(SeriesStream::new(labels, samples))
}

fn label_name(raw: &[u8]) -> Result<&str> {
    match std::str::from_utf8(raw) {
        Ok(name) if is_valid_label_name(name) => Ok(name),
        _ => Err(Error::InvalidLabelName(lossy(raw))),
    }
}

fn label_value<'a>(name: &str, raw: &'a [u8]) -> Result<&'a str> {
    let value = std::str::from_utf8(raw);
    if name == METRIC_NAME_LABEL {
        return match value {
            Ok(v) if is_valid_metric_name(v) => Ok(v),
            _ => Err(Error::InvalidMetricName(lossy(raw))),
        };
    }
    value.map_err(|_| Error::InvalidLabelValue {
        name: name.to_string(),
        value: lossy(raw),
    })
}

fn lossy(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}
