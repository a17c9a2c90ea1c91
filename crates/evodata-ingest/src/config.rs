// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default upper bound on request body size (64 MiB).
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

/// evodata-ingest configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// HTTP server address
    pub http_addr: SocketAddr,
    /// File holding the accepted API keys, one per line
    pub api_keys_file: PathBuf,
    /// Maximum database pool connections
    pub max_connections: u32,
    /// Maximum accepted request body size in bytes
    pub max_request_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `EVODATA_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `EVODATA_HTTP_PORT`: HTTP server port (default: 8080)
    /// - `EVODATA_API_KEYS_FILE`: API key file (default: ./valid_api_keys.txt)
    /// - `EVODATA_MAX_CONNECTIONS`: Database pool size (default: 10)
    /// - `EVODATA_MAX_REQUEST_BYTES`: Request body limit (default: 64 MiB)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("EVODATA_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("EVODATA_DATABASE_URL"))?;

        let http_port: u16 = std::env::var("EVODATA_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("EVODATA_HTTP_PORT", "must be a valid port number")
            })?;

        let api_keys_file = PathBuf::from(
            std::env::var("EVODATA_API_KEYS_FILE")
                .unwrap_or_else(|_| "./valid_api_keys.txt".to_string()),
        );

        let max_connections: u32 = std::env::var("EVODATA_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "EVODATA_MAX_CONNECTIONS",
                "must be a positive integer",
            ))?;

        let max_request_bytes: usize = match std::env::var("EVODATA_MAX_REQUEST_BYTES") {
            Ok(v) => v.parse::<usize>().ok().filter(|n| *n > 0).ok_or(ConfigError::Invalid(
                "EVODATA_MAX_REQUEST_BYTES",
                "must be a positive byte count",
            ))?,
            Err(_) => DEFAULT_MAX_REQUEST_BYTES,
        };

        Ok(Self {
            database_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            api_keys_file,
            max_connections,
            max_request_bytes,
        })
    }

    /// Whether the database URL points at SQLite rather than PostgreSQL.
    pub fn is_sqlite(&self) -> bool {
        self.database_url.starts_with("sqlite:")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
