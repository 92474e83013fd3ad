//! In-memory storage backend.
//!
//! Keeps every series in a single ordered map guarded by an async `RwLock`.
//! Intended for tests and local experiments; nothing is persisted.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::{Storage, StorageError, StorageResult};
use crate::model::{LabelSet, MatchOp, Matcher, Query, Sample, SeriesSet, SeriesStream};

/// Samples of one series keyed by timestamp; a later write at the same
/// timestamp replaces the earlier value.
type Samples = BTreeMap<i64, f64>;

/// A [`Storage`] implementation holding all data in process memory.
///
/// Series are returned ordered by label set, and samples ordered by
/// timestamp.
#[derive(Default)]
pub struct InMemoryStorage {
    series: RwLock<BTreeMap<LabelSet, Samples>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct series stored.
    pub async fn series_count(&self) -> usize {
        self.series.read().await.len()
    }

    /// Total number of samples stored across all series.
    pub async fn sample_count(&self) -> usize {
        self.series.read().await.values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn read(
        &self,
        cancel: &CancellationToken,
        queries: &[Query],
    ) -> StorageResult<Vec<SeriesSet>> {
        let compiled = queries
            .iter()
            .map(|q| {
                q.matchers
                    .iter()
                    .map(CompiledMatcher::compile)
                    .collect::<StorageResult<Vec<_>>>()
            })
            .collect::<StorageResult<Vec<_>>>()?;

        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StorageError::Cancelled),
            guard = self.series.read() => guard,
        };

        let mut results = Vec::with_capacity(queries.len());
        for (query, matchers) in queries.iter().zip(&compiled) {
            if cancel.is_cancelled() {
                return Err(StorageError::Cancelled);
            }

            let mut set = SeriesSet::new();
            for (labels, samples) in guard.iter() {
                if !matchers.iter().all(|m| m.matches(labels)) {
                    continue;
                }
                let selected = select_range(samples, query);
                if !selected.is_empty() {
                    set.push(SeriesStream::new(labels.clone(), selected));
                }
            }
            results.push(set);
        }

        Ok(results)
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn write(&self, cancel: &CancellationToken, series: SeriesSet) -> StorageResult<()> {
        let mut guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StorageError::Cancelled),
            guard = self.series.write() => guard,
        };

        // No await points past this line, so the batch lands in full.
        for stream in series {
            let samples = guard.entry(stream.labels).or_default();
            for sample in stream.samples {
                samples.insert(sample.timestamp, sample.value);
            }
        }
        Ok(())
    }
}

fn select_range(samples: &Samples, query: &Query) -> Vec<Sample> {
    let range = query.range;
    if range.start > range.end {
        return Vec::new();
    }
    samples
        .range(range.start..=range.end)
        .map(|(&timestamp, &value)| Sample::new(timestamp, value))
        .collect()
}

/// A matcher with its regex, if any, compiled once per query.
enum CompiledMatcher<'a> {
    Equal(&'a str, &'a str),
    NotEqual(&'a str, &'a str),
    Regex(&'a str, Regex),
    NotRegex(&'a str, Regex),
}

impl<'a> CompiledMatcher<'a> {
    fn compile(matcher: &'a Matcher) -> StorageResult<Self> {
        let name = matcher.name.as_str();
        let value = matcher.value.as_str();
        Ok(match matcher.op {
            MatchOp::Equal => CompiledMatcher::Equal(name, value),
            MatchOp::NotEqual => CompiledMatcher::NotEqual(name, value),
            MatchOp::RegexMatch => CompiledMatcher::Regex(name, anchored(value)?),
            MatchOp::RegexNotMatch => CompiledMatcher::NotRegex(name, anchored(value)?),
        })
    }

    /// A label that is absent from the set matches as the empty string.
    fn matches(&self, labels: &LabelSet) -> bool {
        match self {
            CompiledMatcher::Equal(name, value) => labels.get(name).unwrap_or("") == *value,
            CompiledMatcher::NotEqual(name, value) => labels.get(name).unwrap_or("") != *value,
            CompiledMatcher::Regex(name, re) => re.is_match(labels.get(name).unwrap_or("")),
            CompiledMatcher::NotRegex(name, re) => !re.is_match(labels.get(name).unwrap_or("")),
        }
    }
}

fn anchored(pattern: &str) -> StorageResult<Regex> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| StorageError::InvalidQuery(format!("invalid regex {:?}: {}", pattern, e)))
}
