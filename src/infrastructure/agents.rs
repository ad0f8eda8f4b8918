//! Generic paginating scraper agent.
//!
//! Owns the rate-limited transport and the pagination loop; what a page
//! *means* is delegated to a site-provided [`ListingPageParser`]. A page
//! that fails terminally ends pagination but keeps the listings collected
//! so far — only a run that produced nothing at all fails.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::listing::RawListing;
use crate::domain::services::{ListingPageParser, ScraperAgent};
use crate::infrastructure::config::ScrapingConfig;
use crate::infrastructure::fetcher::PageFetcher;

/// Pagination behavior for a [`PagedAgent`].
#[derive(Debug, Clone)]
pub struct PagedAgentConfig {
    /// First listing page to fetch.
    pub start_url: String,
    /// Hard ceiling on pages per run.
    pub max_pages: u32,
    /// Politeness delay between pages.
    pub page_delay_ms: u64,
}

impl PagedAgentConfig {
    /// Pagination settings from the application scraping configuration.
    pub fn from_scraping(config: &ScrapingConfig, start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            max_pages: config.max_pages,
            page_delay_ms: config.page_delay_ms,
        }
    }
}

/// A [`ScraperAgent`] that walks listing pages until the parser reports no
/// next page or the page ceiling is reached.
pub struct PagedAgent<P: ListingPageParser> {
    name: String,
    store_id: String,
    fetcher: Arc<dyn PageFetcher>,
    parser: P,
    config: PagedAgentConfig,
}

impl<P: ListingPageParser> PagedAgent<P> {
    pub fn new(
        name: &str,
        store_id: &str,
        fetcher: Arc<dyn PageFetcher>,
        parser: P,
        config: PagedAgentConfig,
    ) -> Self {
        Self {
            name: name.to_string(),
            store_id: store_id.to_string(),
            fetcher,
            parser,
            config,
        }
    }
}

#[async_trait]
impl<P: ListingPageParser> ScraperAgent for PagedAgent<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn store_id(&self) -> &str {
        &self.store_id
    }

    async fn get_listings(&self) -> Result<Vec<RawListing>> {
        let mut collected = Vec::new();
        let mut url = self.config.start_url.clone();
        let mut page = 1u32;

        loop {
            let body = match self.fetcher.fetch_page(&url).await {
                Ok(body) => body,
                Err(e) if page == 1 => {
                    return Err(e).with_context(|| {
                        format!("first listing page failed for store {}", self.store_id)
                    });
                }
                Err(e) => {
                    warn!(
                        "Page {} failed for store {}, keeping {} listings from earlier pages: {}",
                        page,
                        self.store_id,
                        collected.len(),
                        e
                    );
                    break;
                }
            };

            let parsed = self
                .parser
                .parse_page(&body, &url)
                .with_context(|| format!("failed to parse page {page} for store {}", self.store_id))?;

            let observed_at = Utc::now();
            let page_count = parsed.listings.len();
            collected.extend(parsed.listings.into_iter().map(|mut listing| {
                listing.source_store_id = self.store_id.clone();
                listing.observed_at.get_or_insert(observed_at);
                listing
            }));
            debug!(
                "Store {} page {}: {} listings ({} total)",
                self.store_id, page, page_count, collected.len()
            );

            let next = match parsed.next_page {
                Some(next) if next != url => next,
                _ => break,
            };

            if page >= self.config.max_pages {
                warn!(
                    "Store {} hit the page ceiling ({}) with a next page still pending",
                    self.store_id, self.config.max_pages
                );
                break;
            }

            page += 1;
            url = next;
            sleep(Duration::from_millis(self.config.page_delay_ms)).await;
        }

        info!(
            "✅ Store {} scrape finished: {} listings across {} page(s)",
            self.store_id,
            collected.len(),
            page
        );
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::RawPrice;
    use crate::domain::services::ParsedPage;
    use crate::infrastructure::fetcher::FetchError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies keyed by URL; unknown URLs fail terminally.
    struct CannedFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: 3,
                    last: "connection refused".to_string(),
                })
        }
    }

    /// Minimal product-grid parser, the shape a real site parser takes.
    struct GridParser;

    impl ListingPageParser for GridParser {
        fn parse_page(&self, body: &str, _page_url: &str) -> Result<ParsedPage> {
            let document = scraper::Html::parse_document(body);
            let product = scraper::Selector::parse("li.product").unwrap();
            let next = scraper::Selector::parse("a.next").unwrap();

            let listings = document
                .select(&product)
                .filter_map(|element| {
                    let name = element.attr("data-name")?.to_string();
                    Some(RawListing {
                        url: format!("https://shop.example/p/{name}"),
                        name,
                        brand: element.attr("data-brand").unwrap_or("CYMA").to_string(),
                        price: RawPrice::Text(element.attr("data-price")?.to_string()),
                        image_url: None,
                        in_stock: true,
                        source_store_id: String::new(),
                        category: None,
                        min_price: None,
                        max_price: None,
                        shipping_cost: None,
                        free_shipping_threshold: None,
                        observed_at: None,
                        power_type: None,
                    })
                })
                .collect();

            let next_page = document
                .select(&next)
                .next()
                .and_then(|a| a.attr("href"))
                .map(str::to_string);

            Ok(ParsedPage {
                listings,
                next_page,
            })
        }
    }

    fn page(items: &[&str], next: Option<&str>) -> String {
        let mut html = String::from("<html><body><ul>");
        for item in items {
            html.push_str(&format!(
                "<li class=\"product\" data-name=\"{item}\" data-price=\"$200.00\"></li>"
            ));
        }
        html.push_str("</ul>");
        if let Some(next) = next {
            html.push_str(&format!("<a class=\"next\" href=\"{next}\">next</a>"));
        }
        html.push_str("</body></html>");
        html
    }

    fn agent(
        pages: Vec<(&str, String)>,
        max_pages: u32,
    ) -> (PagedAgent<GridParser>, Arc<CannedFetcher>) {
        let fetcher = Arc::new(CannedFetcher {
            pages: pages
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            calls: Mutex::new(Vec::new()),
        });
        let agent = PagedAgent::new(
            "grid-agent",
            "store-a",
            fetcher.clone(),
            GridParser,
            PagedAgentConfig {
                start_url: "p1".to_string(),
                max_pages,
                page_delay_ms: 0,
            },
        );
        (agent, fetcher)
    }

    #[tokio::test]
    async fn paginates_until_no_next_page_and_stamps_store_id() {
        let (agent, fetcher) = agent(
            vec![
                ("p1", page(&["a", "b"], Some("p2"))),
                ("p2", page(&["c"], None)),
            ],
            10,
        );
        let listings = agent.get_listings().await.unwrap();
        assert_eq!(listings.len(), 3);
        assert!(listings.iter().all(|l| l.source_store_id == "store-a"));
        assert!(listings.iter().all(|l| l.observed_at.is_some()));
        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn stops_at_page_ceiling() {
        let (agent, fetcher) = agent(
            vec![
                ("p1", page(&["a"], Some("p2"))),
                ("p2", page(&["b"], Some("p3"))),
                ("p3", page(&["c"], Some("p4"))),
            ],
            2,
        );
        let listings = agent.get_listings().await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn later_page_failure_keeps_earlier_listings() {
        let (agent, _) = agent(vec![("p1", page(&["a"], Some("p-missing")))], 10);
        let listings = agent.get_listings().await.unwrap();
        assert_eq!(listings.len(), 1);
    }

    #[tokio::test]
    async fn first_page_failure_fails_the_run() {
        let (agent, _) = agent(vec![], 10);
        assert!(agent.get_listings().await.is_err());
    }
}
