// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Accepted API keys.
//!
//! Keys are loaded once at startup from a newline-delimited file and never
//! change afterwards, so the set is shared between requests without locking.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Header carrying the client's API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Errors raised while loading the key file.
#[derive(Debug, thiserror::Error)]
pub enum ApiKeyError {
    /// The key file could not be read.
    #[error("failed to read API key file {path:?}: {source}")]
    Read {
        /// Path of the key file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Immutable set of accepted API keys.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: HashSet<String>,
}

impl ApiKeys {
    /// Parse keys from file contents: one key per line.
    ///
    /// A trailing `\r` is stripped and blank lines are skipped, so an empty
    /// line never authorizes a request that sent no key.
    pub fn parse(contents: &str) -> Self {
        contents
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Load keys from `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ApiKeyError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ApiKeyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&contents))
    }

    /// Load keys from `path`, falling back to an empty set on failure.
    ///
    /// An empty set rejects every request.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::from_file(path) {
            Ok(keys) => {
                info!(count = keys.len(), "Loaded API keys");
                keys
            }
            Err(e) => {
                warn!(error = %e, "Could not load API keys, all requests will be rejected");
                Self::default()
            }
        }
    }

    /// Exact-match check of a presented key.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of accepted keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is accepted.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ApiKeys {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}
