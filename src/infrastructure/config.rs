//! Configuration infrastructure
//!
//! Contains configuration loading and management for feedback fetching.
//!
//! Configuration is organized into sections:
//! 1. Fetch settings (pagination, concurrency, throttling)
//! 2. Storage and export locations
//! 3. Logging

#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Feedback API and worker pool settings
    pub fetch: FetchConfig,

    /// Where progress checkpoints live
    pub storage: StorageConfig,

    /// Where exported CSV files are written
    pub export: ExportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Feedback API, pagination and worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base URL of the feedback API (no trailing slash needed)
    pub base_url: String,

    /// Records requested per page (`take`)
    pub page_size: u32,

    /// Identifiers paginated concurrently within one group
    pub concurrency_limit: usize,

    /// Delay before each identifier's first request, in milliseconds
    pub inter_request_delay_ms: u64,

    /// Identifiers per checkpoint group
    pub group_size: usize,

    /// Lookback window used when none is given
    pub default_lookback_days: u32,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Client-side request quota; 0 disables it
    pub max_requests_per_second: u32,

    /// Extra attempts per identifier after a failure
    pub retry_attempts: u32,

    /// Base backoff between identifier retries, doubled per attempt
    pub retry_backoff_ms: u64,

    /// User agent string
    pub user_agent: String,
}

impl FetchConfig {
    pub const fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Progress checkpoint location
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the checkpoint slots; app data dir when unset
    pub progress_dir: Option<PathBuf>,
}

/// CSV export location
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory receiving exported files; downloads dir when unset
    pub export_dir: Option<PathBuf>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            page_size: defaults::PAGE_SIZE,
            concurrency_limit: defaults::CONCURRENCY_LIMIT,
            inter_request_delay_ms: defaults::INTER_REQUEST_DELAY_MS,
            group_size: defaults::GROUP_SIZE,
            default_lookback_days: defaults::LOOKBACK_DAYS,
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            retry_attempts: defaults::RETRY_ATTEMPTS,
            retry_backoff_ms: defaults::RETRY_BACKOFF_MS,
            user_agent: defaults::USER_AGENT.to_string(),
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
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
        }
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

    /// Configuration manager for the default location
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    /// Configuration manager for an explicit file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
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
                warn!("⚠️  Resetting to default configuration");

                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                self.reset_to_defaults().await
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

    /// Update fetch settings in place
    pub async fn update_fetch_config<F>(&self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut FetchConfig),
    {
        let mut config = self.load_config().await?;
        updater(&mut config.fetch);
        self.save_config(&config).await
    }

    /// Reset configuration to defaults (useful for troubleshooting)
    pub async fn reset_to_defaults(&self) -> Result<AppConfig> {
        info!("🔄 Resetting configuration to defaults");

        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;

        info!("✅ Configuration reset to defaults");
        Ok(default_config)
    }

    /// Get the configuration file path
    pub const fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}

/// Resolve where progress checkpoints are stored
pub fn resolve_progress_dir(config: &StorageConfig) -> Result<PathBuf> {
    match &config.progress_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(ConfigManager::get_app_data_dir()?.join("progress")),
    }
}

/// Resolve where exported files go: configured dir, else the user's
/// downloads dir, else `exports/` under the app data dir
pub fn resolve_export_dir(config: &ExportConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.export_dir {
        return Ok(dir.clone());
    }
    match dirs::download_dir() {
        Some(dir) => Ok(dir),
        None => Ok(ConfigManager::get_app_data_dir()?.join("exports")),
    }
}

/// Default configuration values
pub mod defaults {
    use crate::domain::constants::wildberries;

    /// Directory name under the platform config/data dirs
    pub const APP_DIR_NAME: &str = "feedback-harvester";

    /// Configuration file name
    pub const CONFIG_FILE_NAME: &str = "config.json";

    /// Default feedback API base URL
    pub const BASE_URL: &str = wildberries::BASE_URL;

    /// Default page size: the upstream maximum
    pub const PAGE_SIZE: u32 = wildberries::MAX_PAGE_SIZE;

    /// Default identifiers in flight per group
    pub const CONCURRENCY_LIMIT: usize = 3;

    /// Default delay before each identifier's first request
    pub const INTER_REQUEST_DELAY_MS: u64 = 350;

    /// Default identifiers per checkpoint group
    pub const GROUP_SIZE: usize = 1000;

    /// Default lookback window in days
    pub const LOOKBACK_DAYS: u32 = 35;

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Client-side quota disabled by default
    pub const MAX_REQUESTS_PER_SECOND: u32 = 0;

    /// No identifier retries by default
    pub const RETRY_ATTEMPTS: u32 = 0;

    /// Default base backoff between identifier retries
    pub const RETRY_BACKOFF_MS: u64 = 1000;

    /// Default user agent
    pub const USER_AGENT: &str = concat!("feedback-harvester/", env!("CARGO_PKG_VERSION"));

    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Default JSON format setting
    pub const LOG_JSON_FORMAT: bool = false;

    /// Default console output setting
    pub const LOG_CONSOLE_OUTPUT: bool = true;

    /// Default file output setting
    pub const LOG_FILE_OUTPUT: bool = true;

    /// Default maximum log files to keep
    pub const LOG_MAX_FILES: u32 = 5;

    /// Default auto cleanup logs setting
    pub const LOG_AUTO_CLEANUP: bool = true;
}
