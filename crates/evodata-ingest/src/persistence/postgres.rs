// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed persistence implementation.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, instrument};

use crate::error::IngestError;
use crate::migrations;
use crate::model::RunUpload;

use super::{Persistence, RecordRunOutcome, RunRecord};

/// PostgreSQL-backed persistence implementation.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new Postgres-backed persistence implementation.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and run migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, IngestError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| IngestError::Database {
                operation: "connect".to_string(),
                details: e.to_string(),
            })?;

        migrations::run_postgres(&pool).await?;

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
            WHERE idRun = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Persistence for PostgresPersistence {
    #[instrument(skip(self, upload), fields(run_id = upload.run_id))]
    async fn record_run(&self, upload: &RunUpload) -> Result<RecordRunOutcome, IngestError> {
        let tree_values = upload.tree_attribute_values()?;

        let mut tx = self.pool.begin().await?;

        let run = sqlx::query(
            r#"
            INSERT INTO run (idRun, isMultithreadingEnabled, metricConfig, usedDataset)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (idRun) DO NOTHING
            "#,
        )
        .bind(upload.run_id)
        .bind(upload.is_multithreading_enabled)
        .bind(&upload.metric_config)
        .bind(&upload.dataset)
        .execute(&mut *tx)
        .await?;

        let generation_id: i64 = sqlx::query_scalar(
            "INSERT INTO generation (idRun, time) VALUES ($1, $2) RETURNING idGeneration",
        )
        .bind(upload.run_id)
        .bind(upload.time)
        .fetch_one(&mut *tx)
        .await?;

        let mut values_inserted = 0;
        for (tree, values) in upload.trees.iter().zip(&tree_values) {
            let tree_id: i64 = sqlx::query_scalar(
                "INSERT INTO trees (idGeneration, tree) VALUES ($1, $2) RETURNING idTree",
            )
            .bind(generation_id)
            .bind(tree)
            .fetch_one(&mut *tx)
            .await?;

            for value in values {
                sqlx::query(
                    "INSERT INTO tree_data (treeId, value, attributeId) VALUES ($1, $2, $3)",
                )
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
        let result = sqlx::query("UPDATE run SET completed = $1 WHERE idRun = $2")
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
