//! Scrape orchestration: one job per store, concurrent fan-out, wait/poll
//! semantics and system health aggregation.
//!
//! The active-job map is the single-flight mechanism: a second
//! `run_scraping` call for a store whose job is still `Running` is a
//! logged, metered no-op. Job bookkeeping writes are best-effort; a
//! storage failure never aborts the scrape itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::application::matching::MatchingEngine;
use crate::application::monitoring::MonitoringService;
use crate::application::pipeline::DataProcessingPipeline;
use crate::application::reconciler::{PriceChange, PriceReconciler};
use crate::domain::agent_job::{AgentJob, JobStatus};
use crate::domain::catalog::CatalogSummary;
use crate::domain::listing::CleanedListing;
use crate::domain::repositories::{CatalogRepository, OperationRepository};
use crate::domain::services::ScraperAgent;
use crate::infrastructure::config::CoordinatorConfig;

/// Typed failures that cross the coordinator boundary.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("no scraper agent registered for store `{store}`")]
    NotRegistered { store: String },

    #[error("timed out after {timeout_secs}s waiting for operations ({still_running} still running)")]
    WaitTimeout {
        timeout_secs: u64,
        still_running: usize,
    },

    #[error("scrape run failed for store `{store}`: {message}")]
    RunFailed { store: String, message: String },
}

/// Result of one `run_scraping` call.
#[derive(Debug, Clone)]
pub enum ScrapeOutcome {
    Completed(ScrapeSummary),
    /// A run for the store was already in flight; nothing was done.
    AlreadyRunning,
}

/// Counters from one completed scrape run, cached per store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub store: String,
    pub job_id: String,
    pub items_processed: u32,
    pub items_updated: u32,
    pub items_new: u32,
    pub errors: u32,
    pub duration_ms: i64,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
    Unknown,
}

/// Success-rate snapshot over the recent operation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub success_rate: f64,
    pub operations_in_window: u32,
    pub failed_operations: u32,
    pub checked_at: DateTime<Utc>,
}

pub struct AgentCoordinator {
    agents: RwLock<HashMap<String, Arc<dyn ScraperAgent>>>,
    active_jobs: RwLock<HashMap<String, AgentJob>>,
    last_results: RwLock<HashMap<String, ScrapeSummary>>,
    pipeline: DataProcessingPipeline,
    matching: MatchingEngine,
    reconciler: PriceReconciler,
    operations: Arc<dyn OperationRepository>,
    catalog: Arc<dyn CatalogRepository>,
    monitoring: Arc<MonitoringService>,
    config: CoordinatorConfig,
}

impl AgentCoordinator {
    pub fn new(
        pipeline: DataProcessingPipeline,
        matching: MatchingEngine,
        reconciler: PriceReconciler,
        operations: Arc<dyn OperationRepository>,
        catalog: Arc<dyn CatalogRepository>,
        monitoring: Arc<MonitoringService>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            active_jobs: RwLock::new(HashMap::new()),
            last_results: RwLock::new(HashMap::new()),
            pipeline,
            matching,
            reconciler,
            operations,
            catalog,
            monitoring,
            config,
        }
    }

    /// Bind an agent to its store. A later registration for the same store
    /// replaces the earlier one.
    pub async fn register_agent(&self, agent: Arc<dyn ScraperAgent>) {
        let store = agent.store_id().to_string();
        info!("Registered scraper `{}` for store `{}`", agent.name(), store);
        self.agents.write().await.insert(store, agent);
    }

    /// Run one scrape for `store`. At most one run per store is in flight;
    /// a concurrent call is a no-op returning `AlreadyRunning`.
    pub async fn run_scraping(&self, store: &str) -> Result<ScrapeOutcome, CoordinatorError> {
        let agent = self
            .agents
            .read()
            .await
            .get(store)
            .cloned()
            .ok_or_else(|| CoordinatorError::NotRegistered {
                store: store.to_string(),
            })?;

        let job = {
            let mut jobs = self.active_jobs.write().await;
            if jobs
                .get(store)
                .is_some_and(|job| job.status == JobStatus::Running)
            {
                drop(jobs);
                info!("Scrape for store `{}` already running, skipping", store);
                self.monitoring
                    .record_metric("scrape_skipped", 1.0, store_tags(store))
                    .await;
                return Ok(ScrapeOutcome::AlreadyRunning);
            }
            let job = AgentJob::start(agent.name(), store);
            jobs.insert(store.to_string(), job.clone());
            job
        };

        info!("🚀 Starting scrape job {} for store `{}`", job.id, store);
        self.best_effort_bookkeeping(store, self.operations.record_start(&job).await)
            .await;
        let tags = store_tags(store);
        self.monitoring.record_operation_start("scrape", &tags).await;

        let run = self.execute_scrape(agent.as_ref(), store).await;

        let duration_ms = self.monitoring.record_operation_end("scrape", &tags).await;
        let mut finished = job;

        let result = match run {
            Ok(counters) => {
                finished.complete(counters.processed, counters.updated, counters.new);
                self.monitoring
                    .record_metric("items_processed", counters.processed as f64, tags.clone())
                    .await;
                self.monitoring
                    .record_metric("items_new", counters.new as f64, tags.clone())
                    .await;
                if counters.errors > 0 {
                    self.monitoring
                        .record_metric("listing_errors", counters.errors as f64, tags.clone())
                        .await;
                }
                info!(
                    "✅ Scrape for store `{}` completed: {} processed, {} updated, {} new, {} errors ({:.0}ms)",
                    store,
                    counters.processed,
                    counters.updated,
                    counters.new,
                    counters.errors,
                    duration_ms
                );
                let summary = ScrapeSummary {
                    store: store.to_string(),
                    job_id: finished.id.clone(),
                    items_processed: counters.processed,
                    items_updated: counters.updated,
                    items_new: counters.new,
                    errors: counters.errors,
                    duration_ms: finished.duration_ms(),
                    finished_at: Utc::now(),
                };
                // Overwrite-on-rerun cache of the latest result per store.
                self.last_results
                    .write()
                    .await
                    .insert(store.to_string(), summary.clone());
                Ok(ScrapeOutcome::Completed(summary))
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!("❌ Scrape for store `{}` failed: {}", store, message);
                finished.fail(message.clone());
                self.monitoring
                    .record_metric("scrape_failures", 1.0, tags.clone())
                    .await;
                Err(CoordinatorError::RunFailed {
                    store: store.to_string(),
                    message,
                })
            }
        };

        self.best_effort_bookkeeping(store, self.operations.record_finish(&finished).await)
            .await;
        self.active_jobs.write().await.remove(store);

        result
    }

    /// Run every registered store concurrently. The join does not
    /// fail fast: one store's failure never cancels the others, and every
    /// per-store result is returned.
    pub async fn run_all_scrapers(
        &self,
    ) -> Vec<(String, Result<ScrapeOutcome, CoordinatorError>)> {
        let stores: Vec<String> = self.agents.read().await.keys().cloned().collect();
        info!("Running scrapers for {} store(s)", stores.len());

        let runs = stores.into_iter().map(|store| async move {
            let result = self.run_scraping(&store).await;
            (store, result)
        });
        join_all(runs).await
    }

    /// Poll the active-job set until no job is running, or fail with
    /// `WaitTimeout` once the deadline elapses.
    pub async fn wait_for_all_operations(
        &self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<(), CoordinatorError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let still_running = self
                .active_jobs
                .read()
                .await
                .values()
                .filter(|job| job.status == JobStatus::Running)
                .count();
            if still_running == 0 {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CoordinatorError::WaitTimeout {
                    timeout_secs: timeout.as_secs(),
                    still_running,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Success rate over operations started inside the health window.
    pub async fn get_system_health(&self) -> Result<SystemHealth> {
        let since = Utc::now() - ChronoDuration::hours(self.config.health_window_hours);
        let operations = self.operations.recent_operations(since).await?;

        let total = operations.len() as u32;
        let completed = operations
            .iter()
            .filter(|op| op.status == JobStatus::Completed)
            .count() as u32;
        let failed = operations
            .iter()
            .filter(|op| op.status == JobStatus::Failed)
            .count() as u32;

        let (status, success_rate) = classify_success_rate(total, completed);

        Ok(SystemHealth {
            status,
            success_rate,
            operations_in_window: total,
            failed_operations: failed,
            checked_at: Utc::now(),
        })
    }

    /// The latest `limit` operations, newest first.
    pub async fn get_operation_stats(&self, limit: u32) -> Result<Vec<AgentJob>> {
        self.operations.latest_operations(limit).await
    }

    pub async fn get_registered_scraper_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .agents
            .read()
            .await
            .values()
            .map(|agent| agent.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Catalog-level statistics for the operational surface.
    pub async fn get_database_stats(&self) -> Result<CatalogSummary> {
        self.catalog.summary().await
    }

    /// Cached summary of the last completed run for a store, if any.
    pub async fn last_result(&self, store: &str) -> Option<ScrapeSummary> {
        self.last_results.read().await.get(store).cloned()
    }

    async fn execute_scrape(
        &self,
        agent: &dyn ScraperAgent,
        store: &str,
    ) -> Result<RunCounters> {
        let listings = agent.get_listings().await?;
        let cleaned = self.pipeline.process(listings, store).await?;

        let mut counters = RunCounters::default();
        for listing in &cleaned {
            match self.process_listing(listing, store).await {
                Ok((is_new, change)) => {
                    counters.processed += 1;
                    if is_new {
                        counters.new += 1;
                    }
                    if matches!(change, PriceChange::New | PriceChange::Changed { .. }) {
                        counters.updated += 1;
                    }
                }
                Err(e) => {
                    // One bad listing must not abort the batch.
                    counters.errors += 1;
                    warn!("Listing `{}` failed for store `{}`: {:#}", listing.url, store, e);
                }
            }
        }
        Ok(counters)
    }

    async fn process_listing(
        &self,
        listing: &CleanedListing,
        store: &str,
    ) -> Result<(bool, PriceChange)> {
        let (product_id, is_new, _requires_review) = self
            .matching
            .find_or_create(listing, store, &listing.url)
            .await?;
        let change = self.reconciler.reconcile(&product_id, listing, store).await?;
        Ok((is_new, change))
    }

    async fn best_effort_bookkeeping(&self, store: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!("Job bookkeeping write failed for store `{}`: {:#}", store, e);
            self.monitoring
                .record_metric("bookkeeping_write_failures", 1.0, store_tags(store))
                .await;
        }
    }
}

#[derive(Debug, Default)]
struct RunCounters {
    processed: u32,
    updated: u32,
    new: u32,
    errors: u32,
}

fn store_tags(store: &str) -> HashMap<String, String> {
    HashMap::from([("store".to_string(), store.to_string())])
}

/// Zero operations means nothing can be said about health.
fn classify_success_rate(total: u32, completed: u32) -> (HealthStatus, f64) {
    if total == 0 {
        return (HealthStatus::Unknown, 0.0);
    }
    let rate = f64::from(completed) / f64::from(total);
    let status = if rate < 0.5 {
        HealthStatus::Critical
    } else if rate < 0.8 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };
    (status, rate)
}
