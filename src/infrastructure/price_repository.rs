//! SQLite implementation of the store-price and price-history repository.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::catalog::{PriceHistoryEntry, StorePrice};
use crate::domain::repositories::PriceRepository;

#[derive(Clone)]
pub struct SqlitePriceRepository {
    pool: SqlitePool,
}

impl SqlitePriceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceRepository for SqlitePriceRepository {
    async fn get_store_price(
        &self,
        product_id: &str,
        store_id: &str,
    ) -> Result<Option<StorePrice>> {
        let row = sqlx::query(
            r#"
            SELECT product_id, store_id, price, shipping_cost, free_shipping_threshold,
                   in_stock, url, last_updated
            FROM store_prices WHERE product_id = ? AND store_id = ?
            "#,
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| StorePrice {
            product_id: row.get("product_id"),
            store_id: row.get("store_id"),
            price: row.get("price"),
            shipping_cost: row.get("shipping_cost"),
            free_shipping_threshold: row.get("free_shipping_threshold"),
            in_stock: row.get("in_stock"),
            url: row.get("url"),
            last_updated: row.get("last_updated"),
        }))
    }

    async fn upsert_store_price(&self, price: &StorePrice) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO store_prices
            (product_id, store_id, price, shipping_cost, free_shipping_threshold,
             in_stock, url, last_updated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (product_id, store_id) DO UPDATE SET
                price = excluded.price,
                shipping_cost = excluded.shipping_cost,
                free_shipping_threshold = excluded.free_shipping_threshold,
                in_stock = excluded.in_stock,
                url = excluded.url,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&price.product_id)
        .bind(&price.store_id)
        .bind(price.price)
        .bind(price.shipping_cost)
        .bind(price.free_shipping_threshold)
        .bind(price.in_stock)
        .bind(&price.url)
        .bind(price.last_updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_history(&self, entry: &PriceHistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_history (product_id, store_id, price, in_stock, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.product_id)
        .bind(&entry.store_id)
        .bind(entry.price)
        .bind(entry.in_stock)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn history(
        &self,
        product_id: &str,
        store_id: &str,
        limit: u32,
    ) -> Result<Vec<PriceHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, store_id, price, in_stock, recorded_at
            FROM price_history
            WHERE product_id = ? AND store_id = ?
            ORDER BY recorded_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(product_id)
        .bind(store_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PriceHistoryEntry {
                product_id: row.get("product_id"),
                store_id: row.get("store_id"),
                price: row.get("price"),
                in_stock: row.get("in_stock"),
                recorded_at: row.get("recorded_at"),
            })
            .collect())
    }
}
