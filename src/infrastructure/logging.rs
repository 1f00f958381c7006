//! Logging system configuration and initialization
//!
//! This module provides the logging setup for the catalog:
//! - Console output, plain or JSON
//! - Optional daily rolling log file via `tracing-appender`
//! - `RUST_LOG` override, otherwise the configured level with noisy
//!   dependencies turned down
//! - Local-time timestamps

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::ConfigManager;

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Dependencies that are quieted unless TRACE is requested
const QUIET_TARGETS: &[(&str, &str)] = &[
    ("reqwest", "info"),
    ("hyper", "warn"),
    ("hyper_util", "warn"),
    ("h2", "warn"),
    ("rustls", "warn"),
    ("tokio", "info"),
    ("runtime", "warn"),
];

/// Local time with millisecond precision
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Log directory: the configured one, else `<data dir>/species-catalog/logs`,
/// else `./logs`.
pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    config.log_dir.clone().unwrap_or_else(|| {
        ConfigManager::get_app_data_dir()
            .map(|dir| dir.join("logs"))
            .unwrap_or_else(|_| PathBuf::from("logs"))
    })
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LoggingConfig::default())
}

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level
/// plus per-module directives.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    if !config.level.to_lowercase().contains("trace") {
        for (target, level) in QUIET_TARGETS {
            filter = filter.add_directive(format!("{target}={level}").parse()?);
        }
    }

    let mut modules: Vec<_> = config.module_filters.iter().collect();
    modules.sort();
    for (module, level) in modules {
        let directive = format!("{module}={level}");
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("Invalid module filter: {directive}"))?,
        );
    }
    Ok(filter)
}

/// Initialize logging with custom configuration
///
/// # Environment Variable Override
/// ```bash
/// # Show detailed HTTP logs
/// RUST_LOG="debug,reqwest=debug,hyper=debug" species-catalog
/// ```
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!("No logging output configured"));
    }

    let env_filter = build_env_filter(&config)?;
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let log_dir = get_log_directory(&config);
    if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
        if config.auto_cleanup_logs {
            cleanup_old_logs(&log_dir, &config)?;
        }

        let file_appender = rolling::daily(&log_dir, &config.file_prefix);
        let (file_writer, file_guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(file_guard);

        let file_layer = fmt::Layer::new()
            .with_writer(file_writer)
            .with_timer(LocalTimeFormatter)
            .with_ansi(false);
        if config.json_format {
            layers.push(
                file_layer
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .boxed(),
            );
        } else {
            layers.push(file_layer.with_target(false).boxed());
        }
    }

    if config.console_output {
        let console_layer = fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(LocalTimeFormatter);
        if config.json_format {
            layers.push(console_layer.json().boxed());
        } else {
            layers.push(console_layer.with_target(false).boxed());
        }
    }

    Registry::default()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    info!("JSON format: {}", config.json_format);
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
    }
    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Species Catalog System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("==========================================");
}

/// Removes the oldest rolled log files beyond `max_files`.
fn cleanup_old_logs(log_dir: &Path, config: &LoggingConfig) -> Result<usize> {
    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(&config.file_prefix));
        if path.is_file() && is_log {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let keep = config.max_files as usize;
    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        } else {
            removed += 1;
        }
    }
    Ok(removed)
}
