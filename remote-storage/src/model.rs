//! Core data types for the remote storage adapter.
//!
//! This module defines the storage-agnostic data model that sits between the
//! Prometheus wire protocol and a [`Storage`](crate::Storage) backend: queries
//! and matchers for the read path, and label sets, samples and series for
//! both paths. Every backend receives and returns values of these types.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

/// Name of the reserved label holding the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Bit pattern of the Prometheus staleness marker.
///
/// A stale marker is a NaN with a specific payload. It is distinct from the
/// NaN produced by arithmetic and must be carried through the adapter
/// bit-for-bit.
pub const STALE_NAN_BITS: u64 = 0x7ff0_0000_0000_0002;

/// Returns the staleness marker value.
pub fn stale_nan() -> f64 {
    f64::from_bits(STALE_NAN_BITS)
}

/// Returns true if `value` is exactly the staleness marker.
pub fn is_stale_nan(value: f64) -> bool {
    value.to_bits() == STALE_NAN_BITS
}

/// Checks a label name against `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Checks a metric name against `[a-zA-Z_:][a-zA-Z0-9_:]*`.
///
/// Colons are reserved for recording rules but are valid on the wire.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// An inclusive time range in milliseconds since the Unix epoch.
///
/// `start <= end` is not enforced. Backends decide what an inverted range
/// means (the in-memory backend returns no samples).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Returns true if `timestamp` lies within the range, bounds included.
    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// The operation a [`Matcher`] applies to a label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOp {
    Equal,
    NotEqual,
    RegexMatch,
    RegexNotMatch,
}

impl MatchOp {
    /// The PromQL operator for this match operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOp::Equal => "=",
            MatchOp::NotEqual => "!=",
            MatchOp::RegexMatch => "=~",
            MatchOp::RegexNotMatch => "!~",
        }
    }
}

/// A predicate on the value of a single label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub op: MatchOp,
    pub name: String,
    pub value: String,
}

impl Matcher {
    pub fn new(op: MatchOp, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op,
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.op.as_str(), self.value)
    }
}

/// A selection of series: a time range plus the matchers a series must
/// satisfy.
///
/// A query always contains at least one matcher with a non-empty value; the
/// read translator rejects requests that don't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub range: TimeRange,
    pub matchers: Vec<Matcher>,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, matcher) in self.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", matcher)?;
        }
        write!(f, "}} {}", self.range)
    }
}

/// The set of labels identifying a series.
///
/// Names are unique; inserting an existing name replaces its value. Labels
/// iterate in lexicographic order of their names, which gives every encoded
/// response a deterministic label order.
///
/// # Example
///
/// ```
/// use remote_storage::LabelSet;
///
/// let mut labels = LabelSet::new();
/// labels.insert("job", "node");
/// labels.insert("__name__", "up");
/// labels.insert("job", "api");
///
/// let pairs: Vec<_> = labels.iter().collect();
/// assert_eq!(pairs, vec![("__name__", "up"), ("job", "api")]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a label, returning the value it replaced, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the value of `__name__`, if present.
    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates labels in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut labels = LabelSet::new();
        for (name, value) in iter {
            labels.insert(name, value);
        }
        labels
    }
}

impl IntoIterator for LabelSet {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={:?}", name, value)?;
        }
        f.write_str("}")
    }
}

/// A single data point.
///
/// `PartialEq` follows `f64` semantics, so two stale markers do not compare
/// equal. Use [`is_stale_nan`] or compare `value.to_bits()` when that
/// matters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A single time series: its labels and samples.
///
/// Samples stay in the order they were received from the client or produced
/// by the backend. The adapter never re-sorts them.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStream {
    pub labels: LabelSet,
    pub samples: Vec<Sample>,
}

impl SeriesStream {
    pub fn new(labels: LabelSet, samples: Vec<Sample>) -> Self {
        Self { labels, samples }
    }
}

/// An ordered collection of series.
///
/// On the read path there is exactly one set per [`Query`], at the same
/// position. On the write path a request is translated into a single set.
pub type SeriesSet = Vec<SeriesStream>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple("job")]
    #[case::underscore_prefix("_private")]
    #[case::reserved("__name__")]
    #[case::with_digits("valid_name_2")]
    #[case::single_letter("a")]
    fn should_accept_valid_label_name(#[case] name: &str) {
        assert!(is_valid_label_name(name));
    }

    #[rstest]
    #[case::empty("")]
    #[case::leading_digit("9bad")]
    #[case::dash("bad-name")]
    #[case::colon("bad:name")]
    #[case::non_ascii("nämn")]
    #[case::space("a b")]
    fn should_reject_invalid_label_name(#[case] name: &str) {
        assert!(!is_valid_label_name(name));
    }

    #[rstest]
    #[case::simple("up")]
    #[case::recording_rule("job:http_requests:rate5m")]
    #[case::leading_colon(":up")]
    #[case::underscore("_up_2")]
    fn should_accept_valid_metric_name(#[case] name: &str) {
        assert!(is_valid_metric_name(name));
    }

    #[rstest]
    #[case::empty("")]
    #[case::leading_digit("1up")]
    #[case::dot("http.requests")]
    #[case::dash("http-requests")]
    fn should_reject_invalid_metric_name(#[case] name: &str) {
        assert!(!is_valid_metric_name(name));
    }

    #[test]
    fn should_keep_last_value_for_duplicate_label() {
        // given
        let mut labels = LabelSet::new();

        // when
        labels.insert("a", "1");
        let replaced = labels.insert("a", "2");

        // then
        assert_eq!(replaced, Some("1".to_string()));
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.get("a"), Some("2"));
    }

    #[test]
    fn should_iterate_labels_in_name_order() {
        // given
        let labels: LabelSet = [("zone", "b"), ("__name__", "up"), ("job", "node")]
            .into_iter()
            .collect();

        // when
        let names: Vec<&str> = labels.iter().map(|(n, _)| n).collect();

        // then
        assert_eq!(names, vec!["__name__", "job", "zone"]);
        assert_eq!(labels.metric_name(), Some("up"));
    }

    #[test]
    fn should_identify_stale_marker() {
        assert!(is_stale_nan(stale_nan()));
        assert!(!is_stale_nan(f64::NAN));
        assert!(!is_stale_nan(1.0));
    }

    #[test]
    fn should_format_query_as_selector() {
        // given
        let query = Query {
            range: TimeRange::new(0, 2000),
            matchers: vec![
                Matcher::new(MatchOp::Equal, "__name__", "up"),
                Matcher::new(MatchOp::RegexNotMatch, "job", "n.*"),
            ],
        };

        // when
        let formatted = query.to_string();

        // then
        assert_eq!(formatted, r#"{__name__="up", job!~"n.*"} [0, 2000]"#);
    }

    #[test]
    fn should_include_range_bounds() {
        let range = TimeRange::new(0, 2000);
        assert!(range.contains(0));
        assert!(range.contains(2000));
        assert!(!range.contains(2001));
        assert!(!TimeRange::new(10, 5).contains(7));
    }
}
