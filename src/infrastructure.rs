//! Infrastructure layer for HTTP fetching, persistence and configuration.
//!
//! Provides the rate-limited fetcher, the generic paginating agent, SQLite
//! repository implementations and the configuration/logging bootstrap.

pub mod agents;
pub mod catalog_repository;
pub mod config;
pub mod database_connection;
pub mod fetcher;
pub mod logging;
pub mod match_repository;
pub mod operations_repository;
pub mod price_repository;
pub mod telemetry_repository;

// Re-export commonly used items
pub use agents::{PagedAgent, PagedAgentConfig};
pub use catalog_repository::SqliteCatalogRepository;
pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use fetcher::{FetchError, FetcherConfig, PageFetcher, RateLimitedFetcher};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use match_repository::SqliteMatchRepository;
pub use operations_repository::SqliteOperationRepository;
pub use price_repository::SqlitePriceRepository;
pub use telemetry_repository::SqliteTelemetryRepository;
