//! Error types for the remote storage adapter.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors produced while serving a remote read or write request.
///
/// Every variant except [`Error::Storage`] and [`Error::Internal`] is a
/// client fault: the request is rejected before the storage backend is
/// invoked.
#[derive(Debug, Error)]
pub enum Error {
    /// The payload is not valid snappy, or not a valid protobuf message.
    #[error("failed to decode request: {0}")]
    Decode(String),

    /// A label matcher carries a type code outside the known set.
    #[error("unexpected matcher type {0}")]
    UnknownMatcherType(i32),

    /// None of a query's matchers has a non-empty value.
    #[error("query {0}: at least one matcher should have non-empty label value")]
    EmptyMatcherSet(usize),

    #[error("invalid label name {0:?}")]
    InvalidLabelName(String),

    #[error("invalid metric name {0:?}")]
    InvalidMetricName(String),

    #[error("invalid value {value:?} for label {name}")]
    InvalidLabelValue { name: String, value: String },

    /// Opaque failure reported by the storage backend.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the request itself was malformed.
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, Error::Storage(_) | Error::Internal(_))
    }

    /// Short, stable name of the variant, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Decode(_) => "decode",
            Error::UnknownMatcherType(_) => "unknown_matcher_type",
            Error::EmptyMatcherSet(_) => "empty_matcher_set",
            Error::InvalidLabelName(_) => "invalid_label_name",
            Error::InvalidMetricName(_) => "invalid_metric_name",
            Error::InvalidLabelValue { .. } => "invalid_label_value",
            Error::Storage(_) => "storage",
            Error::Internal(_) => "internal",
        }
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;
