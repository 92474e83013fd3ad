//! Remote Storage - a Prometheus remote read/write adapter.
//!
//! Prometheus can forward every scraped sample to a remote endpoint and fetch
//! series back from it when evaluating queries. This crate implements the
//! server side of both protocols on top of a pluggable [`Storage`] backend.
//!
//! # Architecture
//!
//! A request passes through four stages:
//!
//! - **Codec**: the body is snappy block-decompressed and decoded as a
//!   protobuf `ReadRequest` or `WriteRequest`.
//! - **Translation**: wire messages are validated and turned into the
//!   storage-agnostic model ([`Query`], [`LabelSet`], [`SeriesStream`]). Any
//!   invalid matcher or label rejects the whole request before storage is
//!   touched.
//! - **Storage**: the backend answers one [`SeriesSet`] per query, or accepts
//!   a batch of series.
//! - **Encoding**: read results are turned back into a `ReadResponse` with
//!   deterministic label order and compressed for the wire.
//!
//! [`RemoteStorageAdapter`] runs the pipeline; [`server::RemoteStorageServer`]
//! exposes it over HTTP.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use remote_storage::{InMemoryStorage, RemoteStorageAdapter};
//! use tokio_util::sync::CancellationToken;
//!
//! let adapter = RemoteStorageAdapter::new(Arc::new(InMemoryStorage::new()));
//! let cancel = CancellationToken::new();
//!
//! let stats = adapter.write(&write_body, &cancel).await?;
//! let (read_response, _) = adapter.read(&read_body, &cancel).await?;
//! ```

mod adapter;
pub mod config;
mod error;
mod model;
pub mod server;
pub mod storage;

pub use adapter::{ReadStats, RemoteStorageAdapter, WriteStats};
pub use config::Config;
pub use error::{Error, Result};
pub use model::{
    LabelSet, METRIC_NAME_LABEL, MatchOp, Matcher, Query, STALE_NAN_BITS, Sample, SeriesSet,
    SeriesStream, TimeRange, is_stale_nan, is_valid_label_name, is_valid_metric_name, stale_nan,
};
pub use storage::{InMemoryStorage, Storage, StorageError, StorageResult};
