//! SQLite implementation of the listing-match repository.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::catalog::ProductMatch;
use crate::domain::repositories::MatchRepository;

#[derive(Clone)]
pub struct SqliteMatchRepository {
    pool: SqlitePool,
}

impl SqliteMatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchRepository for SqliteMatchRepository {
    async fn find_match(
        &self,
        source_store: &str,
        source_identifier: &str,
    ) -> Result<Option<ProductMatch>> {
        let row = sqlx::query(
            r#"
            SELECT source_store, source_identifier, product_id, confidence_score,
                   requires_review, created_at, updated_at
            FROM product_matches
            WHERE source_store = ? AND source_identifier = ?
            "#,
        )
        .bind(source_store)
        .bind(source_identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ProductMatch {
            source_store: row.get("source_store"),
            source_identifier: row.get("source_identifier"),
            product_id: row.get("product_id"),
            confidence_score: row.get("confidence_score"),
            requires_review: row.get("requires_review"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn upsert_match(&self, record: &ProductMatch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_matches
            (source_store, source_identifier, product_id, confidence_score,
             requires_review, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (source_store, source_identifier) DO UPDATE SET
                product_id = excluded.product_id,
                confidence_score = excluded.confidence_score,
                requires_review = excluded.requires_review,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.source_store)
        .bind(&record.source_identifier)
        .bind(&record.product_id)
        .bind(record.confidence_score)
        .bind(record.requires_review)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
