//! sw-cache server entry point.
//!
//! Boots the service worker from layered configuration and serves its
//! lifecycle events as MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchConfig, HttpFetcher};
use swcache_core::{AppConfig, CacheDb, ServiceWorker};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
    let fetcher = HttpFetcher::new(FetchConfig::from_app_config(&config))?;
    let worker = ServiceWorker::from_config(&config, db, Arc::new(fetcher))?;
    if worker.resume().await? {
        tracing::info!(store = %worker.store_name(), "resumed installed cache store");
    }

    tracing::info!(
        origin = %config.origin,
        store = %config.store_name(),
        "Starting sw-cache server on stdio transport"
    );

    let handler = handler::SwCacheServer::new(Arc::new(worker), config.sync_tag.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
