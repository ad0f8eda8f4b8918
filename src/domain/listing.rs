//! Listing entities produced and consumed by the scraping pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price value as scraped from a listing page.
///
/// Retail sites render prices either as plain numbers (JSON feeds) or as
/// formatted text ("¥42,800", "$449.99 USD"). Both forms are accepted here;
/// the processing pipeline coerces text to a numeric value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(f64),
    Text(String),
}

impl From<f64> for RawPrice {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RawPrice {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A single product offer as emitted by a scraper agent.
///
/// Immutable once emitted; all cleanup happens downstream in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub name: String,
    pub brand: String,
    pub price: RawPrice,
    pub url: String,
    pub image_url: Option<String>,
    pub in_stock: bool,
    pub source_store_id: String,
    pub category: Option<String>,
    pub min_price: Option<RawPrice>,
    pub max_price: Option<RawPrice>,
    pub shipping_cost: Option<f64>,
    pub free_shipping_threshold: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
    pub power_type: Option<String>,
}

/// A listing after the cleaning pipeline: trimmed, numeric, validated and
/// standardized, carrying the advisory anomaly flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedListing {
    pub name: String,
    pub brand: String,
    pub price: f64,
    pub url: String,
    pub image_url: Option<String>,
    pub in_stock: bool,
    pub source_store_id: String,
    pub category: Option<String>,
    pub min_price: f64,
    pub max_price: f64,
    pub shipping_cost: Option<f64>,
    pub free_shipping_threshold: Option<f64>,
    pub observed_at: DateTime<Utc>,
    pub power_type: Option<String>,
    pub has_anomaly: bool,
    pub last_updated: DateTime<Utc>,
}

impl CleanedListing {
    /// Validity invariant enforced before a listing may reach the matcher.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
            && !self.url.is_empty()
            && self.price.is_finite()
            && self.price > 0.0
            && self.min_price > 0.0
            && self.max_price > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(price: f64) -> CleanedListing {
        CleanedListing {
            name: "Test AEG".to_string(),
            brand: "CYMA".to_string(),
            price,
            url: "https://store.example/p/1".to_string(),
            image_url: None,
            in_stock: true,
            source_store_id: "store-a".to_string(),
            category: None,
            min_price: price,
            max_price: price,
            shipping_cost: None,
            free_shipping_threshold: None,
            observed_at: Utc::now(),
            power_type: None,
            has_anomaly: false,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn valid_listing_passes_invariant() {
        assert!(listing(199.0).is_valid());
    }

    #[test]
    fn non_positive_or_nan_price_fails_invariant() {
        assert!(!listing(0.0).is_valid());
        assert!(!listing(-5.0).is_valid());
        assert!(!listing(f64::NAN).is_valid());
    }

    #[test]
    fn empty_name_or_url_fails_invariant() {
        let mut l = listing(100.0);
        l.name.clear();
        assert!(!l.is_valid());

        let mut l = listing(100.0);
        l.url.clear();
        assert!(!l.is_valid());
    }
}
