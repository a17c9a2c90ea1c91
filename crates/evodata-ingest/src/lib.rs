// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! evodata-ingest - Evolutionary Run Data Ingestion
//!
//! This crate accepts evolutionary-algorithm run data over HTTP and stores it in
//! PostgreSQL (or SQLite for local use).
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │  Evolutionary algorithm runs  │
//! └───────────────────────────────┘
//!                │ HTTP POST + X-API-Key
//!                ▼
//! ┌───────────────────────────────┐
//! │        evodata-ingest         │
//! │  auth → method → body → JSON  │
//! │          Port 8080            │
//! └───────────────────────────────┘
//!                │ one transaction per upload
//!                ▼
//! ┌───────────────────────────────┐
//! │    PostgreSQL / SQLite        │
//! │ run, generation, trees,       │
//! │ tree_data                     │
//! └───────────────────────────────┘
//! ```
//!
//! # Endpoints
//!
//! | Path | Body | Effect |
//! |------|------|--------|
//! | `/evolutionary_data` | `{run_id, dataset, trees, attribute_data, is_multithreading_enabled, metric_config, time}` | Records one generation |
//! | `/end_run` | `{run_id}` | Marks the run completed |
//!
//! ## Status Codes
//!
//! | Status | When |
//! |--------|------|
//! | `200` | Request stored |
//! | `400` | Body could not be read or decoded |
//! | `401` | `X-API-Key` missing or not accepted |
//! | `404` | Path other than the two endpoints (no key needed) |
//! | `405` | Method other than POST |
//! | `413` | Body larger than the configured limit |
//! | `500` | Storage failed; nothing from the request was kept |
//!
//! ## Recording Semantics
//!
//! 1. **First upload for a run id**: creates the run row
//! 2. **Later uploads**: leave the run row untouched, add a new generation
//! 3. **Attribute values**: one row per tree and per non-`'0'` position of
//!    `metric_config`, taken from `attribute_data[tree][position]`
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `EVODATA_DATABASE_URL` | Yes | - | PostgreSQL or SQLite connection string |
//! | `EVODATA_HTTP_PORT` | No | `8080` | HTTP server port |
//! | `EVODATA_API_KEYS_FILE` | No | `./valid_api_keys.txt` | Accepted API keys, one per line |
//! | `EVODATA_MAX_CONNECTIONS` | No | `10` | Database pool size |
//! | `EVODATA_MAX_REQUEST_BYTES` | No | `67108864` | Request body limit |

#![deny(missing_docs)]

/// Accepted API keys loaded from a file.
pub mod auth;

/// Server configuration loaded from environment variables.
pub mod config;

/// Error types with HTTP status mapping.
pub mod error;

/// HTTP handlers for run uploads and run completion.
pub mod handlers;

/// Embedded schema migrations.
pub mod migrations;

/// Request payloads.
pub mod model;

/// Persistence trait and PostgreSQL / SQLite backends.
pub mod persistence;

/// HTTP router and server loop.
pub mod server;
