//! SQLite implementation of scrape-operation bookkeeping.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::agent_job::{AgentJob, JobStatus};
use crate::domain::repositories::OperationRepository;

const OPERATION_COLUMNS: &str = "id, agent_name, target_store, operation_type, status, \
                                 started_at, completed_at, items_processed, items_updated, \
                                 items_new, error_message";

#[derive(Clone)]
pub struct SqliteOperationRepository {
    pool: SqlitePool,
}

impl SqliteOperationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<AgentJob> {
        let status: String = row.get("status");
        Ok(AgentJob {
            id: row.get("id"),
            agent_name: row.get("agent_name"),
            target_store: row.get("target_store"),
            operation_type: row.get("operation_type"),
            status: status.parse::<JobStatus>()?,
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            items_processed: row.get::<i64, _>("items_processed") as u32,
            items_updated: row.get::<i64, _>("items_updated") as u32,
            items_new: row.get::<i64, _>("items_new") as u32,
            error_message: row.get("error_message"),
        })
    }
}

#[async_trait]
impl OperationRepository for SqliteOperationRepository {
    async fn record_start(&self, job: &AgentJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_operations
            (id, agent_name, target_store, operation_type, status, started_at,
             items_processed, items_updated, items_new)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.agent_name)
        .bind(&job.target_store)
        .bind(&job.operation_type)
        .bind(job.status.as_str())
        .bind(job.started_at)
        .bind(job.items_processed as i64)
        .bind(job.items_updated as i64)
        .bind(job.items_new as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_finish(&self, job: &AgentJob) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE agent_operations SET
                status = ?,
                completed_at = ?,
                items_processed = ?,
                items_updated = ?,
                items_new = ?,
                error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.completed_at)
        .bind(job.items_processed as i64)
        .bind(job.items_updated as i64)
        .bind(job.items_new as i64)
        .bind(&job.error_message)
        .bind(&job.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_operations(&self, since: DateTime<Utc>) -> Result<Vec<AgentJob>> {
        let rows = sqlx::query(&format!(
            "SELECT {OPERATION_COLUMNS} FROM agent_operations \
             WHERE started_at >= ? ORDER BY started_at DESC"
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_job).collect()
    }

    async fn latest_operations(&self, limit: u32) -> Result<Vec<AgentJob>> {
        let rows = sqlx::query(&format!(
            "SELECT {OPERATION_COLUMNS} FROM agent_operations \
             ORDER BY started_at DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_job).collect()
    }
}
