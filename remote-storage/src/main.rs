//! Remote storage HTTP server binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use remote_storage::Config;
use remote_storage::config::{CliArgs, load_config};
use remote_storage::server::{RemoteStorageServer, ServerConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to load config from {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    tracing::info!("Starting with config: {:?}", config);

    let storage = config.storage.create_storage();
    let server = RemoteStorageServer::new(
        storage,
        ServerConfig {
            port: args.port,
            config,
        },
    );
    server.run().await;
}
