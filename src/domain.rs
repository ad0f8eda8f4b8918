//! Domain module - Core business logic and entities
//!
//! This module contains the domain entities, value tables, repository
//! traits and service contracts shared by the scraping, matching and
//! reconciliation layers.

pub mod agent_job;
pub mod catalog;
pub mod listing;
pub mod repositories;
pub mod services;
pub mod taxonomy;
pub mod telemetry;

// Re-export commonly used items
pub use agent_job::{AgentJob, JobStatus};
pub use catalog::{CatalogProduct, CatalogSummary, PriceHistoryEntry, ProductMatch, StorePrice};
pub use listing::{CleanedListing, RawListing, RawPrice};
pub use services::{ListingPageParser, ParsedPage, ScraperAgent};
pub use telemetry::{AlertConfig, AlertOperator, PerformanceMetric, TriggeredAlert};
