//! Configuration infrastructure.
//!
//! Application configuration is a serde tree with defaults embedding the
//! engine's operational constants, managed as a pretty-printed JSON file
//! under the platform config directory. A default file is written on first
//! run; corrupted files are backed up and replaced rather than crashing
//! startup.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::domain::telemetry::{AlertConfig, AlertOperator};
use crate::infrastructure::fetcher::FetcherConfig;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scraping: ScrapingConfig,
    pub matching: MatchingConfig,
    pub monitoring: MonitoringConfig,
    pub coordinator: CoordinatorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/pricewatch.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Per-agent scraping behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    /// Request budget per rolling minute, per agent.
    pub requests_per_minute: u32,
    /// Maximum fetch attempts per URL.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Randomized inter-request delay bounds in milliseconds.
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
    /// Politeness delay between listing pages in milliseconds.
    pub page_delay_ms: u64,
    /// Hard ceiling on listing pages per run.
    pub max_pages: u32,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 20,
            max_retries: 3,
            backoff_base_ms: 1000,
            jitter_min_ms: 1000,
            jitter_max_ms: 5000,
            request_timeout_seconds: 30,
            page_delay_ms: 3000,
            max_pages: 50,
        }
    }
}

impl ScrapingConfig {
    /// Fetcher view of this configuration.
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            requests_per_minute: self.requests_per_minute,
            max_retries: self.max_retries,
            backoff_base_ms: self.backoff_base_ms,
            jitter_min_ms: self.jitter_min_ms,
            jitter_max_ms: self.jitter_max_ms,
            timeout_seconds: self.request_timeout_seconds,
        }
    }
}

/// Match classification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Scores at or above this are accepted without review.
    pub confidence_threshold: f64,
    /// Scores at or above this (but below confidence) are accepted with a
    /// review flag.
    pub review_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            review_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Periodic flush interval in seconds.
    pub flush_interval_seconds: u64,
    /// Buffer size that triggers an immediate flush.
    pub buffer_flush_size: usize,
    /// Alert rules evaluated against every recorded metric.
    pub alerts: Vec<AlertConfig>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            flush_interval_seconds: 60,
            buffer_flush_size: 100,
            alerts: vec![
                AlertConfig {
                    metric_name: "processing_success_rate".to_string(),
                    threshold: 0.5,
                    operator: AlertOperator::Lt,
                    message: "More than half of a scrape batch failed validation".to_string(),
                },
                AlertConfig {
                    metric_name: "scrape_time".to_string(),
                    threshold: 600_000.0,
                    operator: AlertOperator::Gt,
                    message: "Scrape run exceeded 10 minutes".to_string(),
                },
                AlertConfig {
                    metric_name: "listing_errors".to_string(),
                    threshold: 25.0,
                    operator: AlertOperator::Gt,
                    message: "Excessive per-listing failures in one run".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Deadline for `wait_for_all_operations` in seconds.
    pub wait_timeout_seconds: u64,
    /// Poll interval for `wait_for_all_operations` in seconds.
    pub poll_interval_seconds: u64,
    /// Window for system-health computation in hours.
    pub health_window_hours: i64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            wait_timeout_seconds: 600,
            poll_interval_seconds: 5,
            health_window_hours: 24,
        }
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    /// Enable JSON formatted logs.
    pub json_format: bool,
    /// Enable console output.
    pub console_output: bool,
    /// Enable file output.
    pub file_output: bool,
    /// Module-specific log level filters (e.g. "sqlx": "warn").
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_filters = HashMap::new();
        module_filters.insert("sqlx".to_string(), "warn".to_string());
        module_filters.insert("reqwest".to_string(), "info".to_string());
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            module_filters,
        }
    }
}

/// Loads and persists [`AppConfig`] as JSON in the platform config
/// directory.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("could not determine platform config directory")?
            .join("pricewatch");
        Ok(Self {
            config_path: config_dir.join("pricewatch_config.json"),
        })
    }

    /// Manager rooted at an explicit path (tests, containers).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load the configuration, writing the defaults on first run and
    /// recovering from corrupted files by backing them up.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(
                "No configuration found, writing defaults to {}",
                self.config_path.display()
            );
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("failed to read {}", self.config_path.display()))?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(
                    "Configuration at {} is corrupted ({}), backing it up and resetting",
                    self.config_path.display(),
                    e
                );
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(backup_err) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Could not back up corrupted config: {}", backup_err);
                }
                let default_config = AppConfig::default();
                self.save_config(&default_config).await?;
                Ok(default_config)
            }
        }
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(config).context("failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .with_context(|| format!("failed to write {}", self.config_path.display()))?;
        Ok(())
    }

    /// Load, mutate and persist the configuration in one step.
    pub async fn update_config<F>(&self, updater: F) -> Result<AppConfig>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.load_config().await?;
        updater(&mut config);
        self.save_config(&config).await?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_carry_the_engine_constants() {
        let config = AppConfig::default();
        assert_eq!(config.scraping.requests_per_minute, 20);
        assert_eq!(config.scraping.max_retries, 3);
        assert_eq!(config.scraping.page_delay_ms, 3000);
        assert_eq!(config.matching.confidence_threshold, 0.8);
        assert_eq!(config.matching.review_threshold, 0.6);
        assert_eq!(config.monitoring.flush_interval_seconds, 60);
        assert_eq!(config.monitoring.buffer_flush_size, 100);
        assert_eq!(config.coordinator.wait_timeout_seconds, 600);
        assert_eq!(config.coordinator.health_window_hours, 24);
    }

    #[tokio::test]
    async fn first_load_writes_default_file() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("pricewatch_config.json"));

        let config = manager.load_config().await.unwrap();
        assert!(manager.config_path().exists());
        assert_eq!(config.scraping.requests_per_minute, 20);
    }

    #[tokio::test]
    async fn corrupted_file_is_backed_up_and_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pricewatch_config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let manager = ConfigManager::with_path(path.clone());
        let config = manager.load_config().await.unwrap();

        assert_eq!(config.matching.confidence_threshold, 0.8);
        assert!(path.with_extension("json.corrupted").exists());
    }

    #[tokio::test]
    async fn update_round_trips() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("pricewatch_config.json"));

        manager
            .update_config(|c| c.scraping.max_pages = 5)
            .await
            .unwrap();
        let reloaded = manager.load_config().await.unwrap();
        assert_eq!(reloaded.scraping.max_pages, 5);
    }
}
