//! Pricewatch - retail price aggregation engine
//!
//! This crate provides the scrape-orchestration, data-reconciliation and
//! monitoring core for aggregating airsoft product listings from multiple
//! retail sites into a canonical catalog with per-store price history.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;
