//! The remote read/write pipeline.
//!
//! [`RemoteStorageAdapter`] ties the pieces together: it decodes a request
//! body, validates and translates it into the internal model, calls the
//! storage backend, and (for reads) encodes the results back into the wire
//! format. Translation always completes before the backend is invoked, so a
//! rejected request never reaches storage.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::server::codec;
use crate::server::request::{ReadRequest, WriteRequest};
use crate::server::response::to_proto_response;
use crate::storage::{Storage, StorageError};

/// Totals for a served read request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub queries: usize,
    pub series: usize,
    pub samples: usize,
}

/// Totals for an accepted write request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub series: usize,
    pub samples: usize,
}

impl WriteStats {
    pub fn of(request: &WriteRequest) -> Self {
        Self {
            series: request.series.len(),
            samples: request.sample_count(),
        }
    }
}

/// Serves remote read and write requests against a storage backend.
///
/// The adapter holds no per-request state and can be shared freely across
/// tasks; the backend is the only shared collaborator.
///
/// # Example
///
/// ```ignore
/// let adapter = RemoteStorageAdapter::new(Arc::new(InMemoryStorage::new()));
/// let cancel = CancellationToken::new();
///
/// adapter.write(&write_body, &cancel).await?;
/// let (response_body, stats) = adapter.read(&read_body, &cancel).await?;
/// ```
#[derive(Clone)]
pub struct RemoteStorageAdapter {
    storage: Arc<dyn Storage>,
}

impl RemoteStorageAdapter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Serves a remote read request.
    ///
    /// `body` is a snappy-compressed `ReadRequest`. On success returns the
    /// snappy-compressed `ReadResponse` with one result per query, in query
    /// order.
    ///
    /// # Errors
    ///
    /// Returns a client-fault error if the body cannot be decoded or a query
    /// is invalid, in which case storage is not called. Returns
    /// [`Error::Storage`] if the backend fails or is cancelled.
    pub async fn read(
        &self,
        body: &[u8],
        cancel: &CancellationToken,
    ) -> Result<(Vec<u8>, ReadStats)> {
        let request = ReadRequest::from_body(body)?;
        let queries = request.queries;

        tracing::info!(
            "Queries: {}",
            queries
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        );
        let data = self.storage.read(cancel, &queries).await?;
        if data.len() != queries.len() {
            return Err(Error::Storage(StorageError::Internal(format!(
                "backend returned {} results for {} queries",
                data.len(),
                queries.len()
            ))));
        }
        tracing::debug!("Response data: {:?}", data);

        let stats = ReadStats {
            queries: queries.len(),
            series: data.iter().map(Vec::len).sum(),
            samples: data.iter().flatten().map(|s| s.samples.len()).sum(),
        };
        tracing::info!(
            "Response: {} matrixes, {} time series, {} samples.",
            stats.queries,
            stats.series,
            stats.samples
        );

        let body = codec::encode(&to_proto_response(data))?;
        Ok((body, stats))
    }

    /// Serves a remote write request.
    ///
    /// `body` is a snappy-compressed `WriteRequest`. The batch is validated in
    /// full before anything is handed to storage, and storage is called at
    /// most once.
    ///
    /// # Errors
    ///
    /// Returns a client-fault error if the body cannot be decoded or any
    /// label in any series is invalid. Returns [`Error::Storage`] if the
    /// backend fails or is cancelled.
    pub async fn write(&self, body: &[u8], cancel: &CancellationToken) -> Result<WriteStats> {
        let request = WriteRequest::from_body(body)?;
        self.write_request(request, cancel).await
    }

    /// Hands an already translated write request to storage.
    ///
    /// The HTTP layer uses this to learn the batch size before storage is
    /// called, so failed samples can be counted.
    pub async fn write_request(
        &self,
        request: WriteRequest,
        cancel: &CancellationToken,
    ) -> Result<WriteStats> {
        let stats = WriteStats::of(&request);

        tracing::info!(
            "Writing {} time series, {} samples.",
            stats.series,
            stats.samples
        );
        tracing::debug!("Writing data: {:?}", request.series);

        self.storage.write(cancel, request.series).await?;
        Ok(stats)
    }
}
