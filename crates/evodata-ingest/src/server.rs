// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP server for evodata-ingest.
//!
//! Routes:
//! - `/evolutionary_data`: record one generation of a run
//! - `/end_run`: mark a run completed
//!
//! Both routes accept every method so that the API-key check always runs
//! first; the handlers then reject anything but POST. The key check is a
//! route layer, so unknown paths get 404 with or without a key.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::any;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::auth::API_KEY_HEADER;
use crate::error::IngestError;
use crate::handlers::{AppState, handle_end_run, handle_evolutionary_data};

/// Path accepting run uploads.
pub const EVOLUTIONARY_DATA_PATH: &str = "/evolutionary_data";

/// Path marking runs completed.
pub const END_RUN_PATH: &str = "/end_run";

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(EVOLUTIONARY_DATA_PATH, any(handle_evolutionary_data))
        .route(END_RUN_PATH, any(handle_end_run))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until `shutdown` resolves.
#[instrument(skip(state, shutdown))]
pub async fn run_http_server(
    bind_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    info!(addr = %listener.local_addr()?, "HTTP server starting");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Reject requests whose `X-API-Key` header is missing or not accepted.
///
/// Runs before the method check and before the body is read.
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, IngestError> {
    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|key| state.api_keys.contains(key));

    if !authorized {
        return Err(IngestError::Unauthorized);
    }

    Ok(next.run(request).await)
}
