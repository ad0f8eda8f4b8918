//! End-to-end sanity check for the scrape/match/reconcile cycle.
//!
//! Wires the full engine against an in-memory database and two fixture
//! agents (no network), runs every scraper twice and prints the resulting
//! health, catalog and operation state. The second cycle exercises the
//! idempotent rerun path: no new products, history only on price change.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use pricewatch::application::{
    AgentCoordinator, DataProcessingPipeline, MatchingEngine, MonitoringService, PriceReconciler,
};
use pricewatch::domain::listing::{RawListing, RawPrice};
use pricewatch::domain::services::ScraperAgent;
use pricewatch::infrastructure::{
    init_logging, AppConfig, DatabaseConnection, SqliteCatalogRepository, SqliteMatchRepository,
    SqliteOperationRepository, SqlitePriceRepository, SqliteTelemetryRepository,
};

/// Emits a fixed batch of listings; the second run bumps one price.
struct FixtureAgent {
    name: String,
    store: String,
    price_bump: f64,
}

#[async_trait]
impl ScraperAgent for FixtureAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn store_id(&self) -> &str {
        &self.store
    }

    async fn get_listings(&self) -> Result<Vec<RawListing>> {
        let listing = |name: &str, brand: &str, price: RawPrice, slug: &str| RawListing {
            name: name.to_string(),
            brand: brand.to_string(),
            price,
            url: format!("https://{}/products/{}", self.store, slug),
            image_url: None,
            in_stock: true,
            source_store_id: self.store.clone(),
            category: None,
            min_price: None,
            max_price: None,
            shipping_cost: Some(9.99),
            free_shipping_threshold: Some(150.0),
            observed_at: None,
            power_type: None,
        };

        Ok(vec![
            listing(
                "VFC Avalon M4 Carbine",
                "VFC",
                RawPrice::Number(449.99 + self.price_bump),
                "avalon-m4",
            ),
            listing(
                "Tokyo Marui Hi-Capa 5.1 GBB",
                "TM",
                RawPrice::Text("$164.99".to_string()),
                "hi-capa-51",
            ),
            listing("Broken row", "", RawPrice::Text("call us".to_string()), ""),
        ])
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let config = AppConfig::default();

    let db = DatabaseConnection::in_memory().await?;
    db.migrate().await?;
    let pool = db.pool().clone();

    let telemetry = Arc::new(SqliteTelemetryRepository::new(pool.clone()));
    let monitoring = Arc::new(MonitoringService::new(
        telemetry,
        config.monitoring.alerts.clone(),
        config.monitoring.buffer_flush_size,
    ));
    let shutdown = CancellationToken::new();
    let flush_task = monitoring.clone().spawn_flush_task(
        Duration::from_secs(config.monitoring.flush_interval_seconds),
        shutdown.clone(),
    );

    let catalog = Arc::new(SqliteCatalogRepository::new(pool.clone()));
    let coordinator = Arc::new(AgentCoordinator::new(
        DataProcessingPipeline::new(monitoring.clone()),
        MatchingEngine::new(
            catalog.clone(),
            Arc::new(SqliteMatchRepository::new(pool.clone())),
            config.matching.clone(),
        ),
        PriceReconciler::new(Arc::new(SqlitePriceRepository::new(pool.clone()))),
        Arc::new(SqliteOperationRepository::new(pool.clone())),
        catalog,
        monitoring.clone(),
        config.coordinator.clone(),
    ));

    for (store, name) in [
        ("alpha-airsoft.example", "alpha-fixture"),
        ("bravo-tactical.example", "bravo-fixture"),
    ] {
        coordinator
            .register_agent(Arc::new(FixtureAgent {
                name: name.to_string(),
                store: store.to_string(),
                price_bump: 0.0,
            }))
            .await;
    }

    println!("registered: {:?}", coordinator.get_registered_scraper_names().await);

    // First cycle: everything is new.
    coordinator.run_all_scrapers().await;
    coordinator
        .wait_for_all_operations(Duration::from_secs(30), Duration::from_millis(100))
        .await?;

    // Second cycle with a price bump on one store: match cache hits, one
    // history append.
    coordinator
        .register_agent(Arc::new(FixtureAgent {
            name: "alpha-fixture".to_string(),
            store: "alpha-airsoft.example".to_string(),
            price_bump: 15.0,
        }))
        .await;
    coordinator.run_all_scrapers().await;
    coordinator
        .wait_for_all_operations(Duration::from_secs(30), Duration::from_millis(100))
        .await?;

    let health = coordinator.get_system_health().await?;
    println!(
        "health: {:?} (success rate {:.2}, {} ops)",
        health.status, health.success_rate, health.operations_in_window
    );

    let stats = coordinator.get_database_stats().await?;
    println!(
        "catalog: {} products, {} store prices, {} matches ({} pending review)",
        stats.total_products,
        stats.total_store_prices,
        stats.total_matches,
        stats.matches_pending_review
    );

    for op in coordinator.get_operation_stats(10).await? {
        println!(
            "op {} store={} status={:?} processed={} updated={} new={}",
            op.id, op.target_store, op.status, op.items_processed, op.items_updated, op.items_new
        );
    }

    shutdown.cancel();
    let _ = flush_task.await;
    Ok(())
}
