//! Logging System
//!
//! Structured logging via the `tracing` crate. Provides configurable log
//! levels, output formats, and destinations; module-specific levels are
//! merged into the environment filter.

use crate::error::LibraryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output is file; None means use runtime default
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format, stdout/stderr only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Resolve the log file path with precedence: config file, STACKS_LOG_FILE env, default.
pub fn resolve_log_file_path(config_file: Option<PathBuf>) -> Result<PathBuf, LibraryError> {
    if let Some(p) = config_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    if let Ok(env_path) = std::env::var("STACKS_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    default_log_file_path()
}

fn default_log_file_path() -> Result<PathBuf, LibraryError> {
    let project_dirs = directories::ProjectDirs::from("", "stacks", "stacks").ok_or_else(|| {
        LibraryError::Config("Could not determine platform state directory for log file".to_string())
    })?;
    let state_dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.cache_dir())
        .to_path_buf();
    Ok(state_dir.join("stacks.log"))
}

/// Initialize the logging system.
///
/// Priority order (highest to lowest): `STACKS_LOG` environment variable,
/// configuration file, defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), LibraryError> {
    let disabled = config.map(|c| !c.enabled).unwrap_or(false);
    if disabled {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .init();
        return Ok(());
    }

    let filter = build_env_filter(config);
    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    let output = config.map(|c| c.output.as_str()).unwrap_or("stderr");
    let use_color = config.map(|c| c.color).unwrap_or(true);

    let base_subscriber = Registry::default().with(filter);

    match (format, output) {
        ("json", "file") => {
            let writer = open_log_file(config)?;
            base_subscriber
                .with(fmt::layer().json().with_target(true).with_writer(writer))
                .init();
        }
        ("json", "stdout") => {
            base_subscriber
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stdout))
                .init();
        }
        ("json", _) => {
            base_subscriber
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .init();
        }
        (_, "file") => {
            let writer = open_log_file(config)?;
            base_subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
        }
        (_, "stdout") => {
            base_subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(use_color)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        _ => {
            base_subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(use_color)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }

    Ok(())
}

fn open_log_file(config: Option<&LoggingConfig>) -> Result<std::fs::File, LibraryError> {
    let log_file = resolve_log_file_path(config.and_then(|c| c.file.clone()))?;
    if let Some(parent) = log_file.parent() {
        ensure_log_dir(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .map_err(|e| LibraryError::Config(format!("Failed to open log file {:?}: {}", log_file, e)))
}

fn ensure_log_dir(parent: &Path) -> Result<(), LibraryError> {
    std::fs::create_dir_all(parent)
        .map_err(|e| LibraryError::Config(format!("Failed to create log directory: {}", e)))
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env("STACKS_LOG") {
        return filter;
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return EnvFilter::new("off");
    }

    let mut directives = level.to_string();
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            directives.push_str(&format!(",{}={}", module, module_level));
        }
    }

    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_enables_text_stderr() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.format, "text");
        assert_eq!(config.output, "stderr");
    }

    #[test]
    fn explicit_file_path_wins_over_default() {
        let path = resolve_log_file_path(Some(PathBuf::from("/tmp/custom.log"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.log"));
    }
}
