//! Persistence interfaces and backends for evodata-ingest.
//!
//! This module defines the persistence abstraction and backend implementations.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;

use crate::error::IngestError;
use crate::model::RunUpload;

/// Run row as read back by the backends' `get_run`.
///
/// The request path never reads runs; this exists for operators and tests.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RunRecord {
    /// Caller-supplied run identifier.
    pub run_id: i64,
    /// Whether the run was executed with multithreading.
    pub is_multithreading_enabled: bool,
    /// Metric configuration captured on first upload.
    pub metric_config: String,
    /// Dataset name captured on first upload.
    pub dataset: String,
    /// Whether the run has been marked completed.
    pub completed: bool,
}

/// What a single `record_run` call wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRunOutcome {
    /// False when the run already existed and the insert was ignored.
    pub run_created: bool,
    /// Generated identifier of the new generation row.
    pub generation_id: i64,
    /// Number of tree rows inserted.
    pub trees_inserted: usize,
    /// Number of tree attribute rows inserted.
    pub values_inserted: usize,
}

/// Persistence interface used by the HTTP handlers.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Store one generation of a run in a single transaction.
    ///
    /// Creates the run on first sight (later uploads leave it untouched), one
    /// generation row, one row per tree and one row per recorded attribute of
    /// each tree. Either everything is committed or nothing is.
    async fn record_run(&self, upload: &RunUpload) -> Result<RecordRunOutcome, IngestError>;

    /// Mark a run completed, returning the number of rows affected.
    ///
    /// Completing an unknown or already completed run is not an error.
    async fn complete_run(&self, run_id: i64) -> Result<u64, IngestError>;

    /// Check that the database answers queries.
    async fn health_check_db(&self) -> Result<bool, IngestError>;
}
