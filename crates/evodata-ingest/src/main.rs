// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! evodata-ingest - Evolutionary Run Data Ingestion
//!
//! Accepts run uploads and run completions over HTTP and stores them in the
//! configured database.

use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{error, info};

use evodata_ingest::auth::ApiKeys;
use evodata_ingest::config::Config;
use evodata_ingest::handlers::AppState;
use evodata_ingest::persistence::{Persistence, PostgresPersistence, SqlitePersistence};
use evodata_ingest::server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("evodata_ingest=info".parse()?),
        )
        .init();

    info!("Starting evodata-ingest");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        http_addr = %config.http_addr,
        api_keys_file = %config.api_keys_file.display(),
        max_connections = config.max_connections,
        "Configuration loaded"
    );

    let api_keys = ApiKeys::load_or_empty(&config.api_keys_file);

    // Connect to database and apply migrations
    info!("Connecting to database...");
    let persistence: Arc<dyn Persistence> = if config.is_sqlite() {
        Arc::new(SqlitePersistence::connect(&config.database_url, config.max_connections).await?)
    } else {
        Arc::new(PostgresPersistence::connect(&config.database_url, config.max_connections).await?)
    };

    if !persistence.health_check_db().await? {
        bail!("Database health check failed");
    }
    info!("Database connection established");

    let state = Arc::new(AppState::new(
        persistence,
        api_keys,
        config.max_request_bytes,
    ));

    server::run_http_server(config.http_addr, state, shutdown_signal()).await?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
