//! HTTP server exposing the Prometheus remote read/write endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tokio::signal;

use super::handlers::{
    AppState, handle_healthy, handle_metrics, handle_read, handle_ready, handle_write,
};
use super::metrics::Metrics;
use super::middleware::track_http_metrics;
use crate::adapter::RemoteStorageAdapter;
use crate::config::Config;
use crate::storage::Storage;

/// Settings for a [`RemoteStorageServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub config: Config,
}

/// HTTP server for remote read and write.
pub struct RemoteStorageServer {
    storage: Arc<dyn Storage>,
    config: ServerConfig,
    metrics: Arc<Metrics>,
}

impl RemoteStorageServer {
    /// Create a new server backed by `storage`.
    pub fn new(storage: Arc<dyn Storage>, config: ServerConfig) -> Self {
        Self {
            storage,
            config,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let state = AppState {
            adapter: Arc::new(RemoteStorageAdapter::new(self.storage.clone())),
            metrics: self.metrics.clone(),
            request_timeout: self.config.config.request_timeout(),
        };

        Router::new()
            .route("/api/v1/read", post(handle_read))
            .route("/api/v1/write", post(handle_write))
            .route("/metrics", get(handle_metrics))
            .route("/-/healthy", get(handle_healthy))
            .route("/-/ready", get(handle_ready))
            .layer(DefaultBodyLimit::max(self.config.config.max_request_body_bytes))
            .layer(middleware::from_fn_with_state(
                self.metrics.clone(),
                track_http_metrics,
            ))
            .with_state(state)
    }

    /// Run the HTTP server until SIGINT or SIGTERM.
    pub async fn run(self) {
        let app = self.router();

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        tracing::info!("Starting remote storage HTTP server on {}", addr);

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("Failed to bind {}: {}", addr, e);
                return;
            }
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            tracing::error!("Server error: {}", e);
            return;
        }

        tracing::info!("Server shut down gracefully");
    }
}

/// Listen for SIGTERM (K8s pod termination) and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
