//! keepsake server entry point.
//!
//! Loads configuration, opens the cache store, installs and activates the
//! offline worker, then serves MCP on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use keepsake_client::{FetchConfig, HttpNetwork};
use keepsake_core::{AppConfig, CacheDb, CacheStore, MemoryStore, Network, OfflineWorker, WorkerConfig};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod registration;
mod tools;

#[cfg(test)]
mod test_support;

use registration::Registration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;

    let store: Arc<dyn CacheStore> = if config.in_memory {
        tracing::info!("using in-memory cache store");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!(path = %config.db_path.display(), "opening cache database");
        Arc::new(CacheDb::open(&config.db_path).await?)
    };
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(FetchConfig::from(&config))?);
    let worker = OfflineWorker::new(WorkerConfig::from_app_config(&config)?, store, network);

    let registration = Arc::new(Registration::new(worker));
    let started = registration.start().await;
    tracing::info!(
        cache = %started.install.cache_name,
        stored = started.install.stored.len(),
        failed = started.install.failed.len(),
        activated = started.activate.is_some(),
        "worker started"
    );

    tracing::info!("Starting keepsake server on stdio transport");

    let handler = handler::KeepsakeServer::new(registration, config.origin_url()?);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
