//! Shared fixtures for the integration suites: an in-memory engine stack
//! and canned scraper agents.

// Each test binary uses a different subset of these fixtures.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use pricewatch::application::{
    AgentCoordinator, DataProcessingPipeline, MatchingEngine, MonitoringService, PriceReconciler,
};
use pricewatch::domain::listing::{RawListing, RawPrice};
use pricewatch::domain::services::ScraperAgent;
use pricewatch::infrastructure::config::AppConfig;
use pricewatch::infrastructure::{
    DatabaseConnection, SqliteCatalogRepository, SqliteMatchRepository, SqliteOperationRepository,
    SqlitePriceRepository, SqliteTelemetryRepository,
};

/// Fully wired engine over one in-memory SQLite database.
pub struct TestStack {
    pub pool: SqlitePool,
    pub catalog: Arc<SqliteCatalogRepository>,
    pub matches: Arc<SqliteMatchRepository>,
    pub prices: Arc<SqlitePriceRepository>,
    pub operations: Arc<SqliteOperationRepository>,
    pub monitoring: Arc<MonitoringService>,
    pub matching: MatchingEngine,
    pub reconciler: PriceReconciler,
}

impl TestStack {
    pub async fn new() -> Result<Self> {
        let db = DatabaseConnection::in_memory().await?;
        db.migrate().await?;
        let pool = db.pool().clone();
        let config = AppConfig::default();

        let telemetry = Arc::new(SqliteTelemetryRepository::new(pool.clone()));
        let monitoring = Arc::new(MonitoringService::new(
            telemetry,
            config.monitoring.alerts.clone(),
            config.monitoring.buffer_flush_size,
        ));
        let catalog = Arc::new(SqliteCatalogRepository::new(pool.clone()));
        let matches = Arc::new(SqliteMatchRepository::new(pool.clone()));
        let prices = Arc::new(SqlitePriceRepository::new(pool.clone()));
        let operations = Arc::new(SqliteOperationRepository::new(pool.clone()));

        Ok(Self {
            pool,
            catalog: catalog.clone(),
            matches: matches.clone(),
            prices: prices.clone(),
            operations: operations.clone(),
            monitoring: monitoring.clone(),
            matching: MatchingEngine::new(catalog.clone(), matches, config.matching.clone()),
            reconciler: PriceReconciler::new(prices),
        })
    }

    /// Coordinator wired over this stack, consuming the owned services.
    pub fn coordinator(self) -> Arc<AgentCoordinator> {
        let config = AppConfig::default();
        Arc::new(AgentCoordinator::new(
            DataProcessingPipeline::new(self.monitoring.clone()),
            self.matching,
            self.reconciler,
            self.operations.clone(),
            self.catalog.clone(),
            self.monitoring.clone(),
            config.coordinator.clone(),
        ))
    }
}

/// Build a minimal valid listing.
pub fn listing(name: &str, brand: &str, price: f64, url: &str, store: &str) -> RawListing {
    RawListing {
        name: name.to_string(),
        brand: brand.to_string(),
        price: RawPrice::Number(price),
        url: url.to_string(),
        image_url: None,
        in_stock: true,
        source_store_id: store.to_string(),
        category: None,
        min_price: None,
        max_price: None,
        shipping_cost: None,
        free_shipping_threshold: None,
        observed_at: None,
        power_type: None,
    }
}

/// Agent that serves a canned batch, optionally after a delay, optionally
/// failing. The batch can be swapped between runs.
pub struct CannedAgent {
    pub agent_name: String,
    pub store: String,
    pub delay: Duration,
    pub batches: Mutex<Vec<Result<Vec<RawListing>, String>>>,
}

impl CannedAgent {
    pub fn serving(store: &str, listings: Vec<RawListing>) -> Self {
        Self {
            agent_name: format!("{store}-agent"),
            store: store.to_string(),
            delay: Duration::ZERO,
            batches: Mutex::new(vec![Ok(listings)]),
        }
    }

    pub fn failing(store: &str, message: &str) -> Self {
        Self {
            agent_name: format!("{store}-agent"),
            store: store.to_string(),
            delay: Duration::ZERO,
            batches: Mutex::new(vec![Err(message.to_string())]),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ScraperAgent for CannedAgent {
    fn name(&self) -> &str {
        &self.agent_name
    }

    fn store_id(&self) -> &str {
        &self.store
    }

    async fn get_listings(&self) -> Result<Vec<RawListing>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut batches = self.batches.lock().await;
        let batch = if batches.len() > 1 {
            batches.remove(0)
        } else {
            batches[0].clone()
        };
        batch.map_err(|message| anyhow!(message))
    }
}
