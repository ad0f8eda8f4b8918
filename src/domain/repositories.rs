//! Repository interfaces for the catalog/store backend.
//!
//! The persistent store is the single source of truth; the uniqueness
//! constraints on `(product_id, store_id)` and
//! `(source_store, source_identifier)` back the engine's idempotency
//! guarantees.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::agent_job::AgentJob;
use crate::domain::catalog::{
    CatalogProduct, CatalogSummary, PriceHistoryEntry, ProductMatch, StorePrice,
};
use crate::domain::telemetry::{PerformanceMetric, TriggeredAlert};

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn insert_product(&self, product: &CatalogProduct) -> Result<()>;
    async fn find_product(&self, id: &str) -> Result<Option<CatalogProduct>>;
    /// Candidate search for the matcher: optional brand filter plus
    /// any-keyword name overlap.
    async fn search_candidates(
        &self,
        brand: Option<&str>,
        keywords: &[String],
    ) -> Result<Vec<CatalogProduct>>;
    /// Recompute a product's lowest/highest price from its store prices.
    async fn recompute_price_range(&self, product_id: &str) -> Result<()>;
    async fn summary(&self) -> Result<CatalogSummary>;
}

#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn find_match(
        &self,
        source_store: &str,
        source_identifier: &str,
    ) -> Result<Option<ProductMatch>>;
    /// Upsert keyed by `(source_store, source_identifier)`.
    async fn upsert_match(&self, record: &ProductMatch) -> Result<()>;
}

#[async_trait]
pub trait PriceRepository: Send + Sync {
    async fn get_store_price(
        &self,
        product_id: &str,
        store_id: &str,
    ) -> Result<Option<StorePrice>>;
    /// Upsert keyed by `(product_id, store_id)`.
    async fn upsert_store_price(&self, price: &StorePrice) -> Result<()>;
    async fn append_history(&self, entry: &PriceHistoryEntry) -> Result<()>;
    async fn history(
        &self,
        product_id: &str,
        store_id: &str,
        limit: u32,
    ) -> Result<Vec<PriceHistoryEntry>>;
}

#[async_trait]
pub trait OperationRepository: Send + Sync {
    async fn record_start(&self, job: &AgentJob) -> Result<()>;
    async fn record_finish(&self, job: &AgentJob) -> Result<()>;
    /// Operations started at or after `since`, newest first.
    async fn recent_operations(&self, since: DateTime<Utc>) -> Result<Vec<AgentJob>>;
    /// The latest `limit` operations, newest first.
    async fn latest_operations(&self, limit: u32) -> Result<Vec<AgentJob>>;
}

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    async fn insert_metrics(&self, metrics: &[PerformanceMetric]) -> Result<()>;
    async fn insert_alert(&self, alert: &TriggeredAlert) -> Result<()>;
}
