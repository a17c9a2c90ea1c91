// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for evodata-ingest.
//!
//! Provides a unified error type that maps to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

/// Result type using IngestError
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that can occur while serving an ingestion request.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum IngestError {
    /// The `X-API-Key` header is missing or not in the accepted set.
    #[error("missing or invalid API key")]
    Unauthorized,

    /// The request used a method other than POST.
    #[error("method {0} is not allowed, only POST")]
    MethodNotAllowed(String),

    /// The request body could not be read.
    #[error("failed to read request body: {0}")]
    ReadBody(String),

    /// The request body exceeds the configured maximum.
    #[error("max request size ({0} bytes) exceeded")]
    RequestSizeExceeded(usize),

    /// The request body is not valid JSON for the expected shape.
    #[error("failed to decode json body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The attribute matrix has no value for a recorded attribute of a tree.
    #[error("attribute data has no value for tree {tree}, attribute {attribute}")]
    AttributeOutOfBounds {
        /// Index of the tree in the upload.
        tree: usize,
        /// Position in the metric configuration string.
        attribute: usize,
    },

    /// Database operation failed.
    #[error("Database error during '{operation}': {details}")]
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl IngestError {
    /// Convert the error into the [`StatusCode`] returned to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::ReadBody(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::RequestSizeExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::AttributeOutOfBounds { .. } | Self::Database { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Body text sent to the client.
    ///
    /// Internal details stay in the logs.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Unauthorized",
            Self::MethodNotAllowed(_) => "Only POST method is allowed",
            Self::ReadBody(_) => "Failed to read body",
            Self::RequestSizeExceeded(_) => "Payload Too Large",
            Self::Decode(_) => "Bad Request",
            Self::AttributeOutOfBounds { .. } | Self::Database { .. } => "Internal Server Error",
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request processing failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, self.client_message()).into_response()
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for IngestError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        IngestError::Database {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}
