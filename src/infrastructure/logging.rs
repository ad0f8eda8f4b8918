//! Logging system configuration and initialization.
//!
//! Builds the tracing subscriber from [`LoggingConfig`]: an EnvFilter from
//! the configured level plus per-module filters, a console fmt layer
//! (plain or JSON) and an optional non-blocking file layer whose writer
//! guard is kept alive for the process lifetime.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writers alive; dropping a guard loses
// buffered log lines.
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Log directory next to the executable.
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    exe_dir.join("logs")
}

/// Initialize the logging system with default configuration.
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initialize the logging system from configuration.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = build_env_filter(config)?;

    let console_layer = if config.console_output {
        let layer = fmt::layer().with_target(true);
        if config.json_format {
            Some(layer.json().boxed())
        } else {
            Some(layer.boxed())
        }
    } else {
        None
    };

    let file_layer = if config.file_output {
        let log_dir = get_log_directory();
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
        let appender = rolling::daily(&log_dir, "pricewatch.log");
        let (writer, guard) = non_blocking(appender);
        LOG_GUARDS.lock().unwrap().push(guard);
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed(),
        )
    } else {
        None
    };

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!("🚀 Logging initialized (level: {})", config.level);
    Ok(())
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::try_from_default_env().context("invalid RUST_LOG filter");
    }

    let mut directives = vec![config.level.clone()];
    for (module, level) in &config.module_filters {
        directives.push(format!("{module}={level}"));
    }
    EnvFilter::try_new(directives.join(","))
        .with_context(|| format!("invalid log filter built from level `{}`", config.level))
}
