//! Fuzzy matching of cleaned listings against the canonical catalog.
//!
//! A listing is first checked against existing match records (idempotent
//! and cheap on reruns), then scored against retrieved candidates with a
//! weighted similarity and classified into auto-match, needs-review or
//! new-product. Scoring never fails: missing fields degrade to similarity
//! zero.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::catalog::{CatalogProduct, ProductMatch};
use crate::domain::listing::CleanedListing;
use crate::domain::repositories::{CatalogRepository, MatchRepository};
use crate::domain::taxonomy;
use crate::infrastructure::config::MatchingConfig;

const NAME_WEIGHT: f64 = 0.6;
const BRAND_WEIGHT: f64 = 0.25;
const CATEGORY_WEIGHT: f64 = 0.1;
const TYPE_WEIGHT: f64 = 0.05;

/// Result of matching one listing.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub product_id: String,
    pub confidence: f64,
    pub requires_review: bool,
}

/// Classification of a top candidate score against the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    Accept,
    Review,
    Reject,
}

/// Levenshtein edit distance over characters.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution_cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (prev[j] + substitution_cost)
                .min(prev[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()]
}

/// Normalized edit-distance similarity in [0, 1]. Two empty strings are
/// identical (1.0); one empty string shares nothing (0.0).
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let max_len = a.chars().count().max(b.chars().count()) as f64;
    1.0 - (levenshtein(a, b) as f64 / max_len)
}

pub struct MatchingEngine {
    catalog: Arc<dyn CatalogRepository>,
    matches: Arc<dyn MatchRepository>,
    config: MatchingConfig,
}

impl MatchingEngine {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        matches: Arc<dyn MatchRepository>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            catalog,
            matches,
            config,
        }
    }

    /// Match a listing to a catalog product, or `None` for "new product".
    ///
    /// An existing match record for `(store_id, source_identifier)` is
    /// returned immediately, which makes repeated runs idempotent.
    pub async fn find_match(
        &self,
        listing: &CleanedListing,
        store_id: &str,
        source_identifier: &str,
    ) -> Result<Option<MatchOutcome>> {
        if let Some(existing) = self.matches.find_match(store_id, source_identifier).await? {
            debug!(
                "Match cache hit for {}:{} -> {}",
                store_id, source_identifier, existing.product_id
            );
            return Ok(Some(MatchOutcome {
                product_id: existing.product_id,
                confidence: existing.confidence_score,
                requires_review: false,
            }));
        }

        let name_norm = taxonomy::normalize_name(&listing.name);
        let brand_norm = taxonomy::normalize_brand(&listing.brand);
        let category = taxonomy::detect_category(&listing.name);
        let power_type = taxonomy::detect_power_type(&listing.name);
        let keywords: Vec<String> = name_norm.split_whitespace().map(String::from).collect();

        let brand_filter = (!brand_norm.is_empty()).then_some(brand_norm.as_str());
        let mut candidates = self
            .catalog
            .search_candidates(brand_filter, &keywords)
            .await?;
        if candidates.is_empty() && brand_filter.is_some() {
            candidates = self.catalog.search_candidates(None, &keywords).await?;
        }
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut scored: Vec<(f64, &CatalogProduct)> = candidates
            .iter()
            .map(|candidate| {
                (
                    Self::score_candidate(&name_norm, &brand_norm, category, power_type, candidate),
                    candidate,
                )
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let (best_score, best) = scored[0];
        match self.classify(best_score) {
            MatchDecision::Reject => Ok(None),
            decision => {
                let requires_review = decision == MatchDecision::Review;
                let now = Utc::now();
                self.matches
                    .upsert_match(&ProductMatch {
                        source_store: store_id.to_string(),
                        source_identifier: source_identifier.to_string(),
                        product_id: best.id.clone(),
                        confidence_score: best_score,
                        requires_review,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                debug!(
                    "Matched `{}` -> `{}` (score {:.3}, review: {})",
                    listing.name, best.name, best_score, requires_review
                );
                Ok(Some(MatchOutcome {
                    product_id: best.id.clone(),
                    confidence: best_score,
                    requires_review,
                }))
            }
        }
    }

    /// Create a catalog product for an unmatched listing and record the
    /// match at full confidence so reruns take the cache path.
    pub async fn create_product_for(
        &self,
        listing: &CleanedListing,
        store_id: &str,
        source_identifier: &str,
    ) -> Result<CatalogProduct> {
        let now = Utc::now();
        let brand = taxonomy::canonical_brand(&listing.brand)
            .map(str::to_string)
            .unwrap_or_else(|| listing.brand.clone());
        let power_type = listing
            .power_type
            .clone()
            .unwrap_or_else(|| taxonomy::detect_power_type(&listing.name).to_string());

        let product = CatalogProduct {
            id: Uuid::new_v4().to_string(),
            name: listing.name.clone(),
            brand,
            category: taxonomy::detect_category(&listing.name).to_string(),
            power_type,
            platform: taxonomy::detect_platform(&listing.name).to_string(),
            image_url: listing.image_url.clone(),
            lowest_price: listing.price,
            highest_price: listing.price,
            created_at: now,
            updated_at: now,
        };

        self.catalog.insert_product(&product).await?;
        self.matches
            .upsert_match(&ProductMatch {
                source_store: store_id.to_string(),
                source_identifier: source_identifier.to_string(),
                product_id: product.id.clone(),
                confidence_score: 1.0,
                requires_review: false,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("🆕 New catalog product `{}` ({})", product.name, product.id);
        Ok(product)
    }

    /// Match the listing or create a new product for it. Returns the
    /// product id, whether it was newly created, and the review flag.
    pub async fn find_or_create(
        &self,
        listing: &CleanedListing,
        store_id: &str,
        source_identifier: &str,
    ) -> Result<(String, bool, bool)> {
        match self.find_match(listing, store_id, source_identifier).await? {
            Some(outcome) => Ok((outcome.product_id, false, outcome.requires_review)),
            None => {
                let product = self
                    .create_product_for(listing, store_id, source_identifier)
                    .await?;
                Ok((product.id, true, false))
            }
        }
    }

    pub fn classify(&self, score: f64) -> MatchDecision {
        if score >= self.config.confidence_threshold {
            MatchDecision::Accept
        } else if score >= self.config.review_threshold {
            MatchDecision::Review
        } else {
            MatchDecision::Reject
        }
    }

    fn score_candidate(
        name_norm: &str,
        brand_norm: &str,
        category: &str,
        power_type: &str,
        candidate: &CatalogProduct,
    ) -> f64 {
        let name_similarity =
            string_similarity(name_norm, &taxonomy::normalize_name(&candidate.name));
        let brand_similarity =
            string_similarity(brand_norm, &taxonomy::normalize_brand(&candidate.brand));
        let category_match = if candidate.category == category { 1.0 } else { 0.0 };
        let type_match = if candidate.power_type == power_type { 1.0 } else { 0.0 };

        NAME_WEIGHT * name_similarity
            + BRAND_WEIGHT * brand_similarity
            + CATEGORY_WEIGHT * category_match
            + TYPE_WEIGHT * type_match
    }
}
