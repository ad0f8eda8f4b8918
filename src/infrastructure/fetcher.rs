//! Rate-limited HTTP fetcher for scraper agents.
//!
//! Wraps reqwest with a per-agent request budget, user-agent rotation,
//! randomized inter-request jitter, bot-defense detection and bounded
//! exponential-backoff retries. Two agents scraping different stores each
//! hold an independent budget.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Browser user agents rotated uniformly at random per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.0.0",
];

/// Page content markers that indicate a bot-defense interstitial rather
/// than a real listing page. Matched case-insensitively.
const BOT_DEFENSE_MARKERS: &[&str] = &[
    "captcha",
    "recaptcha",
    "robot check",
    "bot detected",
    "automated access",
    "suspicious activity",
    "unusual traffic",
];

/// Configuration for fetcher behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Request budget per rolling minute.
    pub requests_per_minute: u32,
    /// Maximum attempts per URL before giving up.
    pub max_retries: u32,
    /// Base backoff delay; attempt `n` waits `base * 2^n`.
    pub backoff_base_ms: u64,
    /// Randomized politeness delay bounds applied before every request.
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 20,
            max_retries: 3,
            backoff_base_ms: 1000,
            jitter_min_ms: 1000,
            jitter_max_ms: 5000,
            timeout_seconds: 30,
        }
    }
}

/// Terminal fetch failure. Callers treat `RetriesExhausted` as fatal for
/// the page being fetched, not for the whole scrape run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP status {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("bot defense marker `{marker}` detected at {url}")]
    BotDefense { url: String, marker: String },

    #[error("retries exhausted after {attempts} attempts for {url}: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("invalid fetcher configuration: {0}")]
    Config(String),
}

/// Returns the first bot-defense marker found in `body`, if any.
pub fn detect_bot_defense(body: &str) -> Option<&'static str> {
    let haystack = body.to_lowercase();
    BOT_DEFENSE_MARKERS
        .iter()
        .find(|marker| haystack.contains(*marker))
        .copied()
}

/// Backoff delay before retrying after the given zero-based attempt.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(1u64 << attempt.min(16)))
}

/// HTTP fetcher with a per-agent request budget.
pub struct RateLimitedFetcher {
    client: Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: FetcherConfig,
    /// Context label for provenance in logs (e.g. the agent name).
    context_label: Option<String>,
}

impl RateLimitedFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let per_minute = NonZeroU32::new(config.requests_per_minute)
            .ok_or_else(|| FetchError::Config("request budget must be greater than 0".into()))?;

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .cookie_store(true)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))?;

        let limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        Ok(Self {
            client,
            limiter,
            config,
            context_label: None,
        })
    }

    /// Set a human-readable context label for logging provenance.
    pub fn with_context_label(mut self, label: &str) -> Self {
        self.context_label = Some(label.to_string());
        self
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch a URL, returning the page body.
    ///
    /// Suspends while the request budget is exhausted, inserts the jitter
    /// delay, rotates the user agent, and retries transport failures and
    /// bot-defense pages with exponential backoff. Exhausting the retry cap
    /// yields a terminal [`FetchError::RetriesExhausted`].
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error: Option<FetchError> = None;

        for attempt in 0..self.config.max_retries {
            self.limiter.until_ready().await;
            self.jitter_delay().await;

            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!(
                        "Fetched {} ({} bytes) on attempt {}",
                        url,
                        body.len(),
                        attempt + 1
                    );
                    return Ok(body);
                }
                Err(failure) => {
                    warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt + 1,
                        self.config.max_retries,
                        url,
                        failure.error
                    );
                    let retry_after = failure.retry_after;
                    last_error = Some(failure.error);

                    if attempt + 1 < self.config.max_retries {
                        let mut delay = backoff_delay(self.config.backoff_base_ms, attempt);
                        if let Some(hint) = retry_after {
                            delay = delay.max(hint);
                        }
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.config.max_retries,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, AttemptFailure> {
        let ua = USER_AGENTS[fastrand::usize(..USER_AGENTS.len())];
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());

        match &self.context_label {
            Some(label) => info!("🌐 HTTP GET {} (agent: {})", host, label),
            None => info!("🌐 HTTP GET {}", host),
        }

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, ua)
            .send()
            .await
            .map_err(|e| AttemptFailure::from(FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            }))?;

        let status = response.status();
        if !status.is_success() {
            // Respect Retry-After on throttling/unavailable responses.
            let retry_after = if matches!(
                status,
                StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
            ) {
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs)
            } else {
                None
            };
            return Err(AttemptFailure {
                error: FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                },
                retry_after,
            });
        }

        let body = response.text().await.map_err(|e| {
            AttemptFailure::from(FetchError::Network {
                url: url.to_string(),
                message: format!("failed to read body: {e}"),
            })
        })?;

        if let Some(marker) = detect_bot_defense(&body) {
            return Err(AttemptFailure::from(FetchError::BotDefense {
                url: url.to_string(),
                marker: marker.to_string(),
            }));
        }

        Ok(body)
    }

    async fn jitter_delay(&self) {
        if self.config.jitter_max_ms == 0 {
            return;
        }
        let ms = if self.config.jitter_max_ms > self.config.jitter_min_ms {
            fastrand::u64(self.config.jitter_min_ms..=self.config.jitter_max_ms)
        } else {
            self.config.jitter_max_ms
        };
        sleep(Duration::from_millis(ms)).await;
    }
}

/// One failed attempt, with an optional server-provided backoff hint.
struct AttemptFailure {
    error: FetchError,
    retry_after: Option<Duration>,
}

impl From<FetchError> for AttemptFailure {
    fn from(error: FetchError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// Transport seam used by paginating agents; tests substitute canned pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

#[async_trait]
impl PageFetcher for RateLimitedFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_defense_markers_are_detected_case_insensitively() {
        assert_eq!(
            detect_bot_defense("<title>Robot Check</title>"),
            Some("robot check")
        );
        assert_eq!(detect_bot_defense("please solve this CAPTCHA"), Some("captcha"));
        assert_eq!(
            detect_bot_defense("we detected Unusual Traffic from your network"),
            Some("unusual traffic")
        );
        assert_eq!(detect_bot_defense("<html>ordinary listing page</html>"), None);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1000, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 2), Duration::from_millis(4000));
    }

    #[test]
    fn zero_budget_is_rejected() {
        let config = FetcherConfig {
            requests_per_minute: 0,
            ..Default::default()
        };
        assert!(matches!(
            RateLimitedFetcher::new(config),
            Err(FetchError::Config(_))
        ));
    }

    #[test]
    fn fetcher_builds_with_defaults() {
        let fetcher = RateLimitedFetcher::new(FetcherConfig::default());
        assert!(fetcher.is_ok());
        assert_eq!(fetcher.unwrap().config().requests_per_minute, 20);
    }
}
