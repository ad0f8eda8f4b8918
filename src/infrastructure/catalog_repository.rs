//! SQLite implementation of the catalog repository.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::domain::catalog::{CatalogProduct, CatalogSummary};
use crate::domain::repositories::CatalogRepository;

const PRODUCT_COLUMNS: &str = "id, name, brand, category, power_type, platform, image_url, \
                               lowest_price, highest_price, created_at, updated_at";

/// Candidate queries are capped; the matcher scores and ranks, it does not
/// need the full table.
const CANDIDATE_LIMIT: u32 = 50;

#[derive(Clone)]
pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> CatalogProduct {
        CatalogProduct {
            id: row.get("id"),
            name: row.get("name"),
            brand: row.get("brand"),
            category: row.get("category"),
            power_type: row.get("power_type"),
            platform: row.get("platform"),
            image_url: row.get("image_url"),
            lowest_price: row.get("lowest_price"),
            highest_price: row.get("highest_price"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn insert_product(&self, product: &CatalogProduct) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products
            (id, name, brand, category, power_type, platform, image_url,
             lowest_price, highest_price, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(&product.power_type)
        .bind(&product.platform)
        .bind(&product.image_url)
        .bind(product.lowest_price)
        .bind(product.highest_price)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_product(&self, id: &str) -> Result<Option<CatalogProduct>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(Self::row_to_product))
    }

    async fn search_candidates(
        &self,
        brand: Option<&str>,
        keywords: &[String],
    ) -> Result<Vec<CatalogProduct>> {
        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1");
        if brand.is_some() {
            sql.push_str(" AND LOWER(brand) = ?");
        }
        if !keywords.is_empty() {
            let clauses = vec!["name LIKE ?"; keywords.len()].join(" OR ");
            sql.push_str(&format!(" AND ({clauses})"));
        }
        sql.push_str(&format!(" LIMIT {CANDIDATE_LIMIT}"));

        let mut query = sqlx::query(&sql);
        if let Some(brand) = brand {
            query = query.bind(brand.to_lowercase());
        }
        for keyword in keywords {
            query = query.bind(format!("%{keyword}%"));
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::row_to_product).collect())
    }

    async fn recompute_price_range(&self, product_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE products SET
                lowest_price = COALESCE(
                    (SELECT MIN(price) FROM store_prices WHERE product_id = ?1), lowest_price),
                highest_price = COALESCE(
                    (SELECT MAX(price) FROM store_prices WHERE product_id = ?1), highest_price),
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn summary(&self) -> Result<CatalogSummary> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products) AS total_products,
                (SELECT COUNT(*) FROM store_prices) AS total_store_prices,
                (SELECT COUNT(*) FROM product_matches) AS total_matches,
                (SELECT COUNT(*) FROM product_matches WHERE requires_review = 1)
                    AS matches_pending_review,
                (SELECT MAX(updated_at) FROM products) AS last_updated
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CatalogSummary {
            total_products: row.get::<i64, _>("total_products") as u32,
            total_store_prices: row.get::<i64, _>("total_store_prices") as u32,
            total_matches: row.get::<i64, _>("total_matches") as u32,
            matches_pending_review: row.get::<i64, _>("matches_pending_review") as u32,
            last_updated: row.get("last_updated"),
        })
    }
}
