//! Canonical catalog entities: products, store prices, price history and
//! listing-to-product match records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical, deduplicated product entity that store prices attach to.
///
/// Created by the matching engine when a listing cannot be matched to any
/// existing product; the price-range fields are widened only through the
/// creation path or an explicit recompute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub power_type: String,
    pub platform: String,
    pub image_url: Option<String>,
    pub lowest_price: f64,
    pub highest_price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record linking a scraped listing to a catalog product.
///
/// Keyed uniquely by `(source_store, source_identifier)`; re-processing the
/// same listing updates this record instead of creating a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMatch {
    pub source_store: String,
    pub source_identifier: String,
    pub product_id: String,
    /// Weighted similarity in [0, 1] at the time the match was made.
    pub confidence_score: f64,
    pub requires_review: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current offer for a product at one store; one row per
/// `(product_id, store_id)`, upserted on every reconcile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorePrice {
    pub product_id: String,
    pub store_id: String,
    pub price: f64,
    pub shipping_cost: Option<f64>,
    pub free_shipping_threshold: Option<f64>,
    pub in_stock: bool,
    pub url: String,
    pub last_updated: DateTime<Utc>,
}

/// Append-only price observation, written only when the price actually
/// changed since the previous observation for the same pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub product_id: String,
    pub store_id: String,
    pub price: f64,
    pub in_stock: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate catalog statistics for the operational surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub total_products: u32,
    pub total_store_prices: u32,
    pub total_matches: u32,
    pub matches_pending_review: u32,
    pub last_updated: Option<DateTime<Utc>>,
}
