//! The storage port.
//!
//! The adapter never persists or queries data itself. It translates requests
//! into [`Query`] and [`SeriesSet`] values and hands them to an implementation
//! of [`Storage`], which owns all persistence semantics.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::{Query, SeriesSet};

pub use memory::InMemoryStorage;

/// Errors reported by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The request was cancelled or its deadline elapsed.
    #[error("operation cancelled")]
    Cancelled,

    /// The backend could not evaluate a query (e.g. an invalid regex).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("{0}")]
    Internal(String),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A time series storage backend.
///
/// Implementations are shared across concurrent requests and must be safe for
/// concurrent use. Both operations receive a cancellation token tied to the
/// lifetime of the originating request; a backend should stop work and
/// return [`StorageError::Cancelled`] promptly once it fires.
///
/// # Example
///
/// ```ignore
/// let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
/// let cancel = CancellationToken::new();
///
/// storage.write(&cancel, series).await?;
/// let results = storage.read(&cancel, &queries).await?;
/// assert_eq!(results.len(), queries.len());
/// ```
#[async_trait]
pub trait Storage: Send + Sync {
    /// Evaluates each query independently.
    ///
    /// Returns exactly one [`SeriesSet`] per query, in query order. An error
    /// aborts the whole read; partial results are never returned.
    async fn read(
        &self,
        cancel: &CancellationToken,
        queries: &[Query],
    ) -> StorageResult<Vec<SeriesSet>>;

    /// Stores a batch of series.
    ///
    /// The batch is logically atomic: either every series is stored or none
    /// is.
    async fn write(&self, cancel: &CancellationToken, series: SeriesSet) -> StorageResult<()>;
}
