//! Logging system configuration and initialization
//!
//! This module provides the logging setup with:
//! - Console output (stderr, so command output on stdout stays clean)
//! - File logging with rotation of the previous session's file
//! - Configuration file based log level control, overridable via `RUST_LOG`
//! - Structured JSON logging (optional)

#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::Utc;
use lazy_static::lazy_static;
use tracing::{Subscriber, info, warn};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::ConfigManager;

/// Active log file name; previous sessions are renamed with a timestamp
pub const LOG_FILE_NAME: &str = "feedback-harvester.log";

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<WorkerGuard>> = Mutex::new(Vec::new());
}

/// Millisecond UTC timestamps
struct UtcTimeFormatter;

impl FormatTime for UtcTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"))
    }
}

/// Log directory under the app data dir, falling back to `logs/` next to
/// the executable
pub fn get_log_directory() -> PathBuf {
    ConfigManager::get_app_data_dir().map_or_else(
        |_| {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
                .join("logs")
        },
        |dir| dir.join("logs"),
    )
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Rename the previous session's log file with its modification timestamp
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<Option<PathBuf>> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(None);
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata
        .modified()
        .unwrap_or_else(|_| std::time::SystemTime::now());
    let datetime: chrono::DateTime<Utc> = file_time.into();

    let file_stem = log_file_name.trim_end_matches(".log");
    let timestamped_name = format!("{}.{}.log", file_stem, datetime.format("%Y%m%dT%H%M%S"));
    let timestamped_path = log_dir.join(&timestamped_name);

    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            timestamped_path.display(),
            e
        )
    })?;

    Ok(Some(timestamped_path))
}

/// Initialize logging with custom configuration
///
/// When `RUST_LOG` is unset, the configured level applies to this crate and
/// HTTP client internals are kept at `warn` unless the level is `trace`:
/// ```bash
/// RUST_LOG="debug,reqwest=debug,hyper=debug" feedback-harvester fetch ...
/// ```
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let log_dir = get_log_directory();
    init_logging_in_dir(config, &log_dir)
}

pub fn init_logging_in_dir(config: &LoggingConfig, log_dir: &Path) -> Result<()> {
    if !config.file_output && !config.console_output {
        return Err(anyhow!("No logging output configured"));
    }

    let mut rotated = None;
    if config.file_output {
        std::fs::create_dir_all(log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        rotated = rotate_existing_log_file(log_dir, LOG_FILE_NAME)?;
    }

    let (subscriber, file_guard) = build_subscriber(config, log_dir)?;
    if let Some(guard) = file_guard {
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(guard);
    }
    subscriber.try_init()?;

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
        if let Some(path) = rotated {
            info!("Rotated previous log file to: {:?}", path);
        }
        if config.auto_cleanup_logs {
            cleanup_old_logs(log_dir, config.max_files)?;
        }
    }

    Ok(())
}

/// Compose the filter, file and console layers without installing them.
/// The returned guard flushes the file writer when dropped.
fn build_subscriber(
    config: &LoggingConfig,
    log_dir: &Path,
) -> Result<(impl Subscriber + Send + Sync + 'static, Option<WorkerGuard>)> {
    let env_filter = build_env_filter(config)?;

    let (file_layer, file_guard) = if config.file_output {
        let (file_writer, guard) = non_blocking(rolling::never(log_dir, LOG_FILE_NAME));
        let layer = if config.json_format {
            fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(UtcTimeFormatter)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .boxed()
        } else {
            // time + level + message only
            fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(UtcTimeFormatter)
                .with_target(false)
                .with_ansi(false)
                .boxed()
        };
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_timer(UtcTimeFormatter)
            .with_target(false)
            .boxed()
    });

    let subscriber = Registry::default()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer);
    Ok((subscriber, file_guard))
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    if !config.level.to_lowercase().contains("trace") {
        for directive in ["reqwest=warn", "hyper=warn", "hyper_util=warn", "h2=warn"] {
            filter = filter.add_directive(directive.parse()?);
        }
        filter = filter.add_directive(format!("feedback_harvester_lib={}", config.level).parse()?);
    }

    Ok(filter)
}

/// Keep the `max_files` most recently modified `.log` files, delete the rest.
/// Returns the number of removed files.
pub fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".log"));
        if path.is_file() && is_log {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }
    }

    // newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let keep = max_files as usize;
    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        } else {
            removed += 1;
        }
    }

    if removed > 0 {
        info!("Removed {} old log files (keeping {})", removed, keep);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(config.console_output);
        assert!(config.file_output);
    }

    #[test]
    fn test_log_directory_location() {
        let log_dir = get_log_directory();
        assert!(log_dir.to_string_lossy().ends_with("logs"));
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn file_layer_writes_in_both_formats(#[case] json_format: bool) {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            level: "info".to_string(),
            json_format,
            console_output: true,
            ..LoggingConfig::default()
        };

        let (subscriber, guard) = build_subscriber(&config, dir.path()).unwrap();
        tracing::subscriber::with_default(subscriber, || info!("harvest started"));
        drop(guard);

        let written = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        assert!(written.contains("harvest started"), "{written}");
        assert_eq!(written.trim_start().starts_with('{'), json_format, "{written}");
    }

    #[test]
    fn init_without_outputs_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };

        let err = init_logging_in_dir(&config, dir.path()).unwrap_err();
        assert!(err.to_string().contains("No logging output configured"));
        assert!(!dir.path().join(LOG_FILE_NAME).exists());
    }

    #[test]
    fn rotation_renames_previous_log() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LOG_FILE_NAME), "previous session").unwrap();

        let rotated = rotate_existing_log_file(dir.path(), LOG_FILE_NAME)
            .unwrap()
            .unwrap();
        assert!(!dir.path().join(LOG_FILE_NAME).exists());
        assert_eq!(std::fs::read_to_string(rotated).unwrap(), "previous session");
    }

    #[test]
    fn rotation_without_previous_log_is_noop() {
        let dir = TempDir::new().unwrap();
        assert!(rotate_existing_log_file(dir.path(), LOG_FILE_NAME).unwrap().is_none());
    }

    #[test]
    fn cleanup_keeps_newest_files() {
        let dir = TempDir::new().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);
        for i in 0..4u64 {
            let path = dir.path().join(format!("run-{i}.log"));
            let file = std::fs::File::create(&path).unwrap();
            file.set_modified(base + Duration::from_secs(i * 60)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        let removed = cleanup_old_logs(dir.path(), 2).unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("run-3.log").exists());
        assert!(dir.path().join("run-2.log").exists());
        assert!(!dir.path().join("run-0.log").exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
