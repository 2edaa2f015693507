//! waystation server entry point.
//!
//! Boots the offline cache coordinator and serves it as MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use waystation_client::{CacheCoordinator, FetchClient, FetchConfig, SystemClock};
use waystation_core::{AppConfig, CacheDb};

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

    let config = AppConfig::load()?;
    tracing::info!(
        db_path = %config.db_path.display(),
        origin = %config.origin,
        static_cache = %config.static_cache,
        dynamic_cache = %config.dynamic_cache,
        "starting waystation on stdio transport"
    );

    let db = Arc::new(CacheDb::open(&config.db_path).await?);
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let coordinator = CacheCoordinator::new(&config, db.clone(), fetcher, Arc::new(SystemClock))?.with_replay(db);

    let handler = handler::WaystationServer::new(Arc::new(coordinator));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
