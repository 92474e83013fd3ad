//! Wire protocol and HTTP surface for Prometheus remote read/write.

pub mod codec;
mod error;
mod handlers;
mod http;
mod metrics;
mod middleware;
pub mod proto;
pub mod request;
pub mod response;

pub use error::ApiError;
pub use http::{RemoteStorageServer, ServerConfig};
pub use metrics::Metrics;
