//! Configuration infrastructure
//!
//! Application settings for the species catalog, organized in four sections:
//! 1. `api`: where and how fast to talk to the catalog service
//! 2. `catalog`: paging, batching and debounce knobs of the engine
//! 3. `retry`: detail-fetch retry timing
//! 4. `logging`: subscriber setup
//!
//! Settings can be persisted as JSON through `ConfigManager`, or layered
//! (defaults, optional file, `SPECIES_CATALOG__*` environment) with
//! `AppConfig::load_layered`.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::catalog::retry::RetryPolicy;

/// Prefix of environment overrides, e.g. `SPECIES_CATALOG__CATALOG__PAGE_SIZE=40`
pub const ENV_PREFIX: &str = "SPECIES_CATALOG";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub catalog: CatalogConfig,
    pub retry: RetryPolicy,
    pub logging: LoggingConfig,
}

/// Remote catalog service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Service root, e.g. `https://pokeapi.co/api/v2`
    pub base_url: String,

    pub user_agent: String,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Client-side rate limit
    pub max_requests_per_second: u32,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Stubs per page in paginated mode
    pub page_size: u32,

    /// Detail fetches launched together in one batch
    pub detail_batch_size: usize,

    /// Pause between resolution batches in milliseconds
    pub detail_batch_delay_ms: u64,

    /// Stubs considered for background resolution before "load more results"
    pub resolution_cap: usize,

    /// Trailing debounce of search input in milliseconds
    pub search_debounce_ms: u64,

    /// Capacity of the view event channel
    pub event_buffer: usize,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Directory for log files; defaults to the platform data directory
    pub log_dir: Option<PathBuf>,

    /// File name prefix for the daily rolling log
    pub file_prefix: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,

    /// Module-specific log level filters (e.g., "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: pokeapi::BASE_URL.to_string(),
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: defaults::PAGE_SIZE,
            detail_batch_size: defaults::DETAIL_BATCH_SIZE,
            detail_batch_delay_ms: defaults::DETAIL_BATCH_DELAY_MS,
            resolution_cap: defaults::RESOLUTION_CAP,
            search_debounce_ms: defaults::SEARCH_DEBOUNCE_MS,
            event_buffer: defaults::EVENT_BUFFER,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_prefix: defaults::LOG_FILE_PREFIX.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            module_filters: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Merges built-in defaults, an optional config file and
    /// `SPECIES_CATALOG__*` environment variables, in that order.
    pub fn load_layered(path: Option<&Path>) -> Result<Self> {
        Self::load_layered_with_env(path, None)
    }

    /// Same as `load_layered`, with an explicit environment map instead of
    /// the process environment when `env` is given.
    pub fn load_layered_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: Self = builder
            .build()
            .context("Failed to build layered configuration")?
            .try_deserialize()
            .context("Failed to deserialize layered configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.api.base_url.trim().is_empty(), "api.base_url must not be empty");
        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {}", self.api.base_url))?;
        ensure!(self.api.max_requests_per_second > 0, "api.max_requests_per_second must be > 0");
        ensure!(self.api.timeout_seconds > 0, "api.timeout_seconds must be > 0");
        ensure!(self.catalog.page_size > 0, "catalog.page_size must be > 0");
        ensure!(self.catalog.detail_batch_size > 0, "catalog.detail_batch_size must be > 0");
        ensure!(self.catalog.resolution_cap > 0, "catalog.resolution_cap must be > 0");
        ensure!(self.retry.backoff_multiplier >= 1.0, "retry.backoff_multiplier must be >= 1.0");
        ensure!(
            self.retry.base_delay_ms <= self.retry.max_delay_ms,
            "retry.base_delay_ms must not exceed retry.max_delay_ms"
        );
        Ok(())
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(config_dir)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(data_dir)
    }

    /// Manager for the default per-user config file
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist.
    ///
    /// A file that no longer parses is backed up next to the original and
    /// replaced by the defaults.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration file is invalid: {}", parse_error);
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;
                info!("✅ Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Update one part of the stored configuration
    pub async fn update_config<F>(&self, updater: F) -> Result<AppConfig>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.load_config().await?;
        updater(&mut config);
        config.validate()?;
        self.save_config(&config).await?;
        Ok(config)
    }

    /// Reset configuration to defaults (useful for troubleshooting)
    pub async fn reset_to_defaults(&self) -> Result<AppConfig> {
        info!("🔄 Resetting configuration to defaults");
        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;
        Ok(default_config)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Catalog service endpoints
pub mod pokeapi {
    pub const BASE_URL: &str = "https://pokeapi.co/api/v2";

    /// Collection endpoint, paged with `offset`/`limit`
    pub const LIST_PATH: &str = "pokemon";

    /// Category (type) membership index
    pub const CATEGORY_PATH: &str = "type";

    pub const SPECIES_PATH: &str = "pokemon-species";

    /// Detail record of one species by name or numeric id
    pub fn detail_url(base_url: &str, identifier: &str) -> String {
        format!("{}/{}/{}/", base_url.trim_end_matches('/'), LIST_PATH, identifier)
    }

    pub fn category_url(base_url: &str, category: &str) -> String {
        format!("{}/{}/{}/", base_url.trim_end_matches('/'), CATEGORY_PATH, category)
    }

    pub fn species_url(base_url: &str, numeric_id: u32) -> String {
        format!("{}/{}/{}/", base_url.trim_end_matches('/'), SPECIES_PATH, numeric_id)
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "species-catalog";
    pub const CONFIG_FILE_NAME: &str = "species_catalog_config.json";

    pub const USER_AGENT: &str = concat!("species-catalog/", env!("CARGO_PKG_VERSION"));

    /// Request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const MAX_REQUESTS_PER_SECOND: u32 = 20;

    pub const PAGE_SIZE: u32 = 20;

    pub const DETAIL_BATCH_SIZE: usize = 10;

    pub const DETAIL_BATCH_DELAY_MS: u64 = 300;

    /// Stubs resolved in the background under a category filter
    pub const RESOLUTION_CAP: usize = 50;

    pub const SEARCH_DEBOUNCE_MS: u64 = 300;

    pub const EVENT_BUFFER: usize = 256;

    /// Retries after the first detail attempt
    pub const DETAIL_MAX_RETRIES: u32 = 3;

    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    pub const RETRY_MAX_DELAY_MS: u64 = 30_000;

    pub const RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

    pub const RETRY_JITTER_MS: u64 = 1000;

    /// Upper bound of the random delay before a detail fetch
    pub const PREFETCH_JITTER_MS: u64 = 300;

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_JSON_FORMAT: bool = false;

    pub const LOG_CONSOLE_OUTPUT: bool = true;

    pub const LOG_FILE_OUTPUT: bool = false;

    pub const LOG_FILE_PREFIX: &str = "species-catalog.log";

    pub const LOG_MAX_FILES: u32 = 5;

    pub const LOG_AUTO_CLEANUP: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_engine_constants() {
        let config = AppConfig::default();
        assert_eq!(config.catalog.page_size, 20);
        assert_eq!(config.catalog.detail_batch_size, 10);
        assert_eq!(config.catalog.resolution_cap, 50);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.prefetch_jitter_ms, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let mut config = AppConfig::default();
        config.catalog.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.max_requests_per_second = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn layered_file_and_env_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "catalog": {{ "page_size": 40 }}, "api": {{ "timeout_seconds": 5 }} }}"#)
            .unwrap();

        let env = HashMap::from([
            ("SPECIES_CATALOG__CATALOG__DETAIL_BATCH_SIZE".to_string(), "5".to_string()),
            ("SPECIES_CATALOG__LOGGING__LEVEL".to_string(), "debug".to_string()),
        ]);
        let config = AppConfig::load_layered_with_env(Some(file.path()), Some(env)).unwrap();

        assert_eq!(config.catalog.page_size, 40);
        assert_eq!(config.catalog.detail_batch_size, 5);
        assert_eq!(config.api.timeout_seconds, 5);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.catalog.resolution_cap, defaults::RESOLUTION_CAP);
    }

    #[test]
    fn layered_validation_failure_is_reported() {
        let env = HashMap::from([(
            "SPECIES_CATALOG__CATALOG__PAGE_SIZE".to_string(),
            "0".to_string(),
        )]);
        assert!(AppConfig::load_layered_with_env(None, Some(env)).is_err());
    }

    #[tokio::test]
    async fn manager_creates_and_round_trips_config() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));

        let created = manager.load_config().await.unwrap();
        assert_eq!(created, AppConfig::default());
        assert!(manager.config_path().exists());

        let updated = manager
            .update_config(|config| config.catalog.page_size = 50)
            .await
            .unwrap();
        assert_eq!(updated.catalog.page_size, 50);
        assert_eq!(manager.load_config().await.unwrap().catalog.page_size, 50);
    }

    #[tokio::test]
    async fn corrupted_file_is_backed_up_and_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let manager = ConfigManager::with_path(&path);
        let config = manager.load_config().await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.with_extension("json.corrupted").exists());
    }
}
