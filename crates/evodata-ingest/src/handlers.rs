// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP request handlers for evodata-ingest.
//!
//! Each handler runs after the API-key check and then, in order:
//! - rejects any method other than POST
//! - reads the whole body into memory
//! - decodes the body into the route's payload
//! - forwards the payload to the persistence layer

use std::error::Error as _;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Method;
use http_body_util::LengthLimitError;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::auth::ApiKeys;
use crate::error::IngestError;
use crate::model::{EndRun, RunUpload};
use crate::persistence::Persistence;

/// Body returned for every successfully processed request.
pub const SUCCESS_BODY: &str = "Successfully received POST request";

/// Shared state for HTTP handlers.
///
/// Built once at startup; nothing in it changes while serving.
pub struct AppState {
    /// Persistence implementation.
    pub persistence: Arc<dyn Persistence>,
    /// Accepted API keys.
    pub api_keys: ApiKeys,
    /// Upper bound on request body size.
    pub max_request_bytes: usize,
}

impl AppState {
    /// Create a new handler state.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        api_keys: ApiKeys,
        max_request_bytes: usize,
    ) -> Self {
        Self {
            persistence,
            api_keys,
            max_request_bytes,
        }
    }
}

// ============================================================================
// Evolutionary Data
// ============================================================================

/// Handle `/evolutionary_data`: record one generation of a run.
#[instrument(skip_all)]
pub async fn handle_evolutionary_data(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<&'static str, IngestError> {
    let upload: RunUpload = read_json(&state, request).await?;

    let outcome = state.persistence.record_run(&upload).await?;

    info!(
        run_id = upload.run_id,
        generation_id = outcome.generation_id,
        run_created = outcome.run_created,
        trees = outcome.trees_inserted,
        values = outcome.values_inserted,
        "Recorded evolutionary data"
    );

    Ok(SUCCESS_BODY)
}

// ============================================================================
// End Run
// ============================================================================

/// Handle `/end_run`: mark a run completed.
#[instrument(skip_all)]
pub async fn handle_end_run(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<&'static str, IngestError> {
    let end: EndRun = read_json(&state, request).await?;

    let rows_affected = state.persistence.complete_run(end.run_id).await?;

    info!(run_id = end.run_id, rows_affected, "Run marked completed");

    Ok(SUCCESS_BODY)
}

// ============================================================================
// Helpers
// ============================================================================

/// Check the method, read the body and decode it as JSON.
async fn read_json<T: DeserializeOwned>(
    state: &AppState,
    request: Request,
) -> Result<T, IngestError> {
    if request.method() != Method::POST {
        return Err(IngestError::MethodNotAllowed(request.method().to_string()));
    }

    debug!(path = %request.uri().path(), "Reading request body");

    let limit = state.max_request_bytes;
    let body = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| {
            if e.source().is_some_and(|s| s.is::<LengthLimitError>()) {
                IngestError::RequestSizeExceeded(limit)
            } else {
                IngestError::ReadBody(e.to_string())
            }
        })?;

    Ok(serde_json::from_slice(&body)?)
}
