//! Listing processing pipeline: clean, validate, enhance, detect
//! anomalies, standardize.
//!
//! Stages run strictly in order over a whole batch. Malformed individual
//! listings are filtered, never thrown; only a stage-level failure aborts
//! the batch for the store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::application::monitoring::MonitoringService;
use crate::domain::listing::{CleanedListing, RawListing, RawPrice};
use crate::domain::taxonomy;

static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.]").expect("valid regex"));

/// Coerce a scraped price to a numeric value by stripping non-numeric
/// characters ("¥42,800" -> 42800.0). Uncoercible text becomes NaN and is
/// dropped by the validate stage.
fn coerce_price(raw: &RawPrice) -> f64 {
    match raw {
        RawPrice::Number(value) => *value,
        RawPrice::Text(text) => {
            let stripped = NON_NUMERIC.replace_all(text, "");
            stripped.parse::<f64>().unwrap_or(f64::NAN)
        }
    }
}

pub struct DataProcessingPipeline {
    monitoring: Arc<MonitoringService>,
}

impl DataProcessingPipeline {
    pub fn new(monitoring: Arc<MonitoringService>) -> Self {
        Self { monitoring }
    }

    /// Run the five stages over a batch of raw listings for one store.
    pub async fn process(
        &self,
        listings: Vec<RawListing>,
        store_id: &str,
    ) -> Result<Vec<CleanedListing>> {
        let total = listings.len();
        let cleaned = Self::clean(listings);

        let (mut valid, dropped_invalid, dropped_duplicates) = Self::validate(cleaned);
        let success_rate = if total > 0 {
            valid.len() as f64 / total as f64
        } else {
            1.0
        };
        let tags = HashMap::from([("store".to_string(), store_id.to_string())]);
        self.monitoring
            .record_metric("processing_success_rate", success_rate, tags.clone())
            .await;
        if dropped_invalid > 0 || dropped_duplicates > 0 {
            debug!(
                "Store {}: dropped {} invalid and {} duplicate listings",
                store_id, dropped_invalid, dropped_duplicates
            );
            self.monitoring
                .record_metric(
                    "listings_dropped_invalid",
                    dropped_invalid as f64,
                    tags.clone(),
                )
                .await;
        }

        Self::enhance(&mut valid);

        let anomalies = Self::detect_anomalies(&mut valid);
        if anomalies > 0 {
            warn!(
                "Store {}: {} listings priced outside their expected band",
                store_id, anomalies
            );
            self.monitoring
                .record_metric("price_anomalies_detected", anomalies as f64, tags)
                .await;
        }

        Self::standardize(&mut valid);

        info!(
            "Store {}: pipeline kept {}/{} listings ({} anomalies flagged)",
            store_id,
            valid.len(),
            total,
            anomalies
        );
        Ok(valid)
    }

    /// Stage 1: trim strings, coerce prices to numbers and stamp the
    /// observation time.
    fn clean(listings: Vec<RawListing>) -> Vec<CleanedListing> {
        let now = Utc::now();
        listings
            .into_iter()
            .map(|raw| {
                let price = coerce_price(&raw.price);
                let min_price = raw.min_price.as_ref().map(coerce_price).unwrap_or(price);
                let max_price = raw.max_price.as_ref().map(coerce_price).unwrap_or(price);
                CleanedListing {
                    name: raw.name.trim().to_string(),
                    brand: raw.brand.trim().to_string(),
                    price,
                    url: raw.url.trim().to_string(),
                    image_url: raw.image_url.map(|u| u.trim().to_string()),
                    in_stock: raw.in_stock,
                    source_store_id: raw.source_store_id,
                    category: raw.category.map(|c| c.trim().to_lowercase()),
                    min_price,
                    max_price,
                    shipping_cost: raw.shipping_cost,
                    free_shipping_threshold: raw.free_shipping_threshold,
                    observed_at: raw.observed_at.unwrap_or(now),
                    power_type: raw.power_type.map(|p| p.trim().to_lowercase()),
                    has_anomaly: false,
                    last_updated: now,
                }
            })
            .collect()
    }

    /// Stage 2: drop listings violating the validity invariant, plus exact
    /// duplicate source URLs within the batch. Returns the survivors and
    /// the two drop counts.
    fn validate(listings: Vec<CleanedListing>) -> (Vec<CleanedListing>, usize, usize) {
        let mut seen_urls = HashSet::new();
        let mut valid = Vec::with_capacity(listings.len());
        let mut dropped_invalid = 0usize;
        let mut dropped_duplicates = 0usize;

        for listing in listings {
            if !listing.is_valid() {
                dropped_invalid += 1;
                continue;
            }
            if !seen_urls.insert(listing.url.clone()) {
                dropped_duplicates += 1;
                continue;
            }
            valid.push(listing);
        }

        (valid, dropped_invalid, dropped_duplicates)
    }

    /// Stage 3: derive a consistent price range even when scraped min/max
    /// disagree with the listed price.
    fn enhance(listings: &mut [CleanedListing]) {
        for listing in listings.iter_mut() {
            listing.min_price = listing.min_price.min(listing.price);
            listing.max_price = listing.max_price.max(listing.price);
        }
    }

    /// Stage 4: flag prices outside the expected band for the declared
    /// power type. Advisory only; flagged listings stay in the batch.
    fn detect_anomalies(listings: &mut [CleanedListing]) -> usize {
        let mut flagged = 0usize;
        for listing in listings.iter_mut() {
            let band = taxonomy::price_band(listing.power_type.as_deref().unwrap_or(""));
            if listing.price < band.min || listing.price > band.max {
                listing.has_anomaly = true;
                flagged += 1;
            }
        }
        flagged
    }

    /// Stage 5: canonicalize brand spelling and refresh the update stamp.
    fn standardize(listings: &mut [CleanedListing]) {
        let now = Utc::now();
        for listing in listings.iter_mut() {
            if let Some(canonical) = taxonomy::canonical_brand(&listing.brand) {
                listing.brand = canonical.to_string();
            }
            listing.last_updated = now;
        }
    }
}
