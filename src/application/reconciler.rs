//! Store-price reconciliation with changed-since-last-observation history.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use crate::domain::catalog::{PriceHistoryEntry, StorePrice};
use crate::domain::listing::CleanedListing;
use crate::domain::repositories::PriceRepository;

/// What the reconcile pass observed for one listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceChange {
    /// First observation for this `(product, store)` pair.
    New,
    /// Price differs from the previous observation.
    Changed { previous: f64 },
    /// Price unchanged; no history entry written.
    Unchanged,
}

pub struct PriceReconciler {
    prices: Arc<dyn PriceRepository>,
}

impl PriceReconciler {
    pub fn new(prices: Arc<dyn PriceRepository>) -> Self {
        Self { prices }
    }

    /// Upsert the store price for `(product_id, listing.store)` and append
    /// a history entry iff no prior row existed or the price changed.
    ///
    /// The prior price is read *before* the upsert; the product's own
    /// lowest/highest range is not touched here (see
    /// `CatalogRepository::recompute_price_range`).
    pub async fn reconcile(
        &self,
        product_id: &str,
        listing: &CleanedListing,
        store_id: &str,
    ) -> Result<PriceChange> {
        let prior = self.prices.get_store_price(product_id, store_id).await?;

        let now = Utc::now();
        self.prices
            .upsert_store_price(&StorePrice {
                product_id: product_id.to_string(),
                store_id: store_id.to_string(),
                price: listing.price,
                shipping_cost: listing.shipping_cost,
                free_shipping_threshold: listing.free_shipping_threshold,
                in_stock: listing.in_stock,
                url: listing.url.clone(),
                last_updated: now,
            })
            .await?;

        let change = match prior {
            None => PriceChange::New,
            Some(ref previous) if previous.price != listing.price => PriceChange::Changed {
                previous: previous.price,
            },
            Some(_) => PriceChange::Unchanged,
        };

        if change != PriceChange::Unchanged {
            self.prices
                .append_history(&PriceHistoryEntry {
                    product_id: product_id.to_string(),
                    store_id: store_id.to_string(),
                    price: listing.price,
                    in_stock: listing.in_stock,
                    recorded_at: now,
                })
                .await?;
            debug!(
                "Price history appended for {}@{}: {:?} -> {}",
                product_id, store_id, change, listing.price
            );
        }

        Ok(change)
    }
}
