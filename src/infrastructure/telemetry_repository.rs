//! SQLite implementation of metric and alert persistence.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::repositories::TelemetryRepository;
use crate::domain::telemetry::{PerformanceMetric, TriggeredAlert};

#[derive(Clone)]
pub struct SqliteTelemetryRepository {
    pool: SqlitePool,
}

impl SqliteTelemetryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TelemetryRepository for SqliteTelemetryRepository {
    async fn insert_metrics(&self, metrics: &[PerformanceMetric]) -> Result<()> {
        if metrics.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for metric in metrics {
            sqlx::query(
                r#"
                INSERT INTO performance_metrics (name, value, tags, recorded_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&metric.name)
            .bind(metric.value)
            .bind(serde_json::to_string(&metric.tags)?)
            .bind(metric.recorded_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_alert(&self, alert: &TriggeredAlert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (metric_name, metric_value, threshold, operator, message, triggered_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.metric_name)
        .bind(alert.metric_value)
        .bind(alert.threshold)
        .bind(alert.operator.as_str())
        .bind(&alert.message)
        .bind(alert.triggered_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
