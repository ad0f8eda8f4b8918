//! Service contracts at the scraping seam.
//!
//! Site-specific selector logic lives outside this crate; these traits are
//! the boundary it plugs into.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::listing::RawListing;

/// A scraper bound to one store. Implementations own their rate-limited
/// fetcher and must emit listings already annotated with the store id.
#[async_trait]
pub trait ScraperAgent: Send + Sync {
    /// Human-readable agent name for logs and job bookkeeping.
    fn name(&self) -> &str;

    /// Store this agent scrapes; one agent per store.
    fn store_id(&self) -> &str;

    /// Fetch and parse all listing pages for the store.
    async fn get_listings(&self) -> Result<Vec<RawListing>>;
}

/// One parsed listing page: the listings it contained and the next page to
/// fetch, if any.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub listings: Vec<RawListing>,
    pub next_page: Option<String>,
}

/// Site-specific page parsing contract. Implementations receive the raw
/// page body and turn it into listings plus the next-page link.
pub trait ListingPageParser: Send + Sync {
    fn parse_page(&self, body: &str, page_url: &str) -> Result<ParsedPage>;
}
