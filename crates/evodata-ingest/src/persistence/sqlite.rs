//! SQLite-backed persistence implementation.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, instrument};

use crate::error::IngestError;
use crate::migrations;
use crate::model::RunUpload;

use super::{Persistence, RecordRunOutcome, RunRecord};

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `url`, creating the database file if needed, and run migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, IngestError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| IngestError::Database {
                operation: "connect".to_string(),
                details: format!("Invalid SQLite URL {:?}: {}", url, e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| IngestError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", url, e),
            })?;

        migrations::run_sqlite(&pool).await?;

        Ok(Self { pool })
    }

    /// Look up a run by id.
    pub async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>, IngestError> {
        let record = sqlx::query_as::<_, RunRecord>(
            r#"
            SELECT idRun AS run_id,
                   isMultithreadingEnabled AS is_multithreading_enabled,
                   metricConfig AS metric_config,
                   usedDataset AS dataset,
                   completed
            FROM run
            WHERE idRun = ?
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    #[instrument(skip(self, upload), fields(run_id = upload.run_id))]
    async fn record_run(&self, upload: &RunUpload) -> Result<RecordRunOutcome, IngestError> {
        let tree_values = upload.tree_attribute_values()?;

        let mut tx = self.pool.begin().await?;

        let run = sqlx::query(
            r#"
            INSERT OR IGNORE INTO run (idRun, isMultithreadingEnabled, metricConfig, usedDataset)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(upload.run_id)
        .bind(upload.is_multithreading_enabled)
        .bind(&upload.metric_config)
        .bind(&upload.dataset)
        .execute(&mut *tx)
        .await?;

        let generation_id = sqlx::query("INSERT INTO generation (idRun, time) VALUES (?, ?)")
            .bind(upload.run_id)
            .bind(upload.time)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        let mut values_inserted = 0;
        for (tree, values) in upload.trees.iter().zip(&tree_values) {
            let tree_id = sqlx::query("INSERT INTO trees (idGeneration, tree) VALUES (?, ?)")
                .bind(generation_id)
                .bind(tree)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();

            for value in values {
                sqlx::query("INSERT INTO tree_data (treeId, value, attributeId) VALUES (?, ?, ?)")
                    .bind(tree_id)
                    .bind(value.value)
                    .bind(value.attribute_id)
                    .execute(&mut *tx)
                    .await?;
                values_inserted += 1;
            }
        }

        tx.commit().await?;

        let outcome = RecordRunOutcome {
            run_created: run.rows_affected() > 0,
            generation_id,
            trees_inserted: upload.trees.len(),
            values_inserted,
        };
        debug!(?outcome, "Run data recorded");
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn complete_run(&self, run_id: i64) -> Result<u64, IngestError> {
        let result = sqlx::query("UPDATE run SET completed = ? WHERE idRun = ?")
            .bind(true)
            .bind(run_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn health_check_db(&self) -> Result<bool, IngestError> {
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }
}
