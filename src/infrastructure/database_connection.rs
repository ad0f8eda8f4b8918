//! Database connection and pool management.
//!
//! SQLite via sqlx. The schema is created in `migrate()`; the uniqueness
//! constraints on `store_prices` and `product_matches` are load-bearing:
//! they make concurrent reconcile/match writes safe without explicit
//! locking.

use std::path::Path;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, 10).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");

        // File-backed databases need the parent directory and the file to
        // exist before sqlx will open them.
        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            if !Path::new(db_path).exists() {
                std::fs::File::create(db_path)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database on a single connection (tests, sanity binaries).
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_products_sql = r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                brand TEXT NOT NULL,
                category TEXT NOT NULL,
                power_type TEXT NOT NULL,
                platform TEXT NOT NULL,
                image_url TEXT,
                lowest_price REAL NOT NULL,
                highest_price REAL NOT NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
        "#;

        let create_store_prices_sql = r#"
            CREATE TABLE IF NOT EXISTS store_prices (
                product_id TEXT NOT NULL,
                store_id TEXT NOT NULL,
                price REAL NOT NULL,
                shipping_cost REAL,
                free_shipping_threshold REAL,
                in_stock BOOLEAN NOT NULL DEFAULT 1,
                url TEXT NOT NULL,
                last_updated DATETIME NOT NULL,
                UNIQUE (product_id, store_id),
                FOREIGN KEY (product_id) REFERENCES products (id) ON DELETE CASCADE
            )
        "#;

        let create_price_history_sql = r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id TEXT NOT NULL,
                store_id TEXT NOT NULL,
                price REAL NOT NULL,
                in_stock BOOLEAN NOT NULL DEFAULT 1,
                recorded_at DATETIME NOT NULL,
                FOREIGN KEY (product_id) REFERENCES products (id) ON DELETE CASCADE
            )
        "#;

        let create_product_matches_sql = r#"
            CREATE TABLE IF NOT EXISTS product_matches (
                source_store TEXT NOT NULL,
                source_identifier TEXT NOT NULL,
                product_id TEXT NOT NULL,
                confidence_score REAL NOT NULL,
                requires_review BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                UNIQUE (source_store, source_identifier),
                FOREIGN KEY (product_id) REFERENCES products (id) ON DELETE CASCADE
            )
        "#;

        let create_agent_operations_sql = r#"
            CREATE TABLE IF NOT EXISTS agent_operations (
                id TEXT PRIMARY KEY,
                agent_name TEXT NOT NULL,
                target_store TEXT NOT NULL,
                operation_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                started_at DATETIME NOT NULL,
                completed_at DATETIME,
                items_processed INTEGER NOT NULL DEFAULT 0,
                items_updated INTEGER NOT NULL DEFAULT 0,
                items_new INTEGER NOT NULL DEFAULT 0,
                error_message TEXT
            )
        "#;

        let create_performance_metrics_sql = r#"
            CREATE TABLE IF NOT EXISTS performance_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                value REAL NOT NULL,
                tags TEXT NOT NULL DEFAULT '{}',
                recorded_at DATETIME NOT NULL
            )
        "#;

        let create_alerts_sql = r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                metric_name TEXT NOT NULL,
                metric_value REAL NOT NULL,
                threshold REAL NOT NULL,
                operator TEXT NOT NULL,
                message TEXT NOT NULL,
                triggered_at DATETIME NOT NULL
            )
        "#;

        let create_indexes_sql = r#"
            CREATE INDEX IF NOT EXISTS idx_products_brand ON products (brand);
            CREATE INDEX IF NOT EXISTS idx_store_prices_product ON store_prices (product_id);
            CREATE INDEX IF NOT EXISTS idx_price_history_pair ON price_history (product_id, store_id);
            CREATE INDEX IF NOT EXISTS idx_matches_product ON product_matches (product_id);
            CREATE INDEX IF NOT EXISTS idx_operations_started ON agent_operations (started_at);
            CREATE INDEX IF NOT EXISTS idx_metrics_name ON performance_metrics (name);
        "#;

        sqlx::query(create_products_sql).execute(&self.pool).await?;
        sqlx::query(create_store_prices_sql).execute(&self.pool).await?;
        sqlx::query(create_price_history_sql).execute(&self.pool).await?;
        sqlx::query(create_product_matches_sql).execute(&self.pool).await?;
        sqlx::query(create_agent_operations_sql).execute(&self.pool).await?;
        sqlx::query(create_performance_metrics_sql).execute(&self.pool).await?;
        sqlx::query(create_alerts_sql).execute(&self.pool).await?;
        for statement in create_indexes_sql.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                sqlx::query(statement).execute(&self.pool).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn connects_and_migrates_on_disk() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");
        let database_url = format!("sqlite:{}", db_path.display());

        let db = DatabaseConnection::new(&database_url).await?;
        db.migrate().await?;

        let table = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='store_prices'",
        )
        .fetch_optional(db.pool())
        .await?;
        assert!(table.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn migrate_is_idempotent() -> Result<()> {
        let db = DatabaseConnection::in_memory().await?;
        db.migrate().await?;
        db.migrate().await?;
        Ok(())
    }

    #[tokio::test]
    async fn store_price_uniqueness_is_enforced() -> Result<()> {
        let db = DatabaseConnection::in_memory().await?;
        db.migrate().await?;

        let insert = "INSERT INTO store_prices (product_id, store_id, price, in_stock, url, last_updated) \
                      VALUES ('p1', 's1', 100.0, 1, 'u', '2026-01-01T00:00:00Z')";
        sqlx::query(insert).execute(db.pool()).await?;
        assert!(sqlx::query(insert).execute(db.pool()).await.is_err());
        Ok(())
    }
}
