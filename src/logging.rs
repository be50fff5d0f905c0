// Logging system for Tinkerbox
use std::io::{self, IsTerminal};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format (pretty for terminals, json for programmatic use)
    pub format: LogFormat,
    /// Color output configuration
    pub color: ColorConfig,
    /// Whether to show targets (module names)
    pub show_targets: bool,
    /// Whether to show timestamps
    pub show_timestamps: bool,
}

/// Log output format options
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Pretty output for terminals
    Pretty,
    /// JSON output for programmatic use
    Json,
    /// Compact format for structured logging
    Compact,
}

/// Color output configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ColorConfig {
    /// Automatically detect if colors should be used
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            color: ColorConfig::Auto,
            show_targets: false,
            show_timestamps: false,
        }
    }
}

impl LogConfig {
    /// Create logging configuration from CLI arguments
    pub fn from_cli(verbose: bool, quiet: bool, color: Option<String>) -> Self {
        let level = if quiet {
            Level::ERROR
        } else if verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };

        let color_config = match color.as_deref() {
            Some("always") => ColorConfig::Always,
            Some("never") => ColorConfig::Never,
            Some("auto") | None => ColorConfig::Auto,
            _ => ColorConfig::Auto,
        };

        Self {
            level,
            format: LogFormat::Pretty,
            color: color_config,
            show_targets: false,
            show_timestamps: false,
        }
    }

    /// Check if colors should be used based on configuration and terminal
    pub fn should_use_colors(&self) -> bool {
        match self.color {
            ColorConfig::Always => true,
            ColorConfig::Never => false,
            ColorConfig::Auto => {
                io::stderr().is_terminal()
                    && std::env::var("TERM").map_or(true, |term| term != "dumb")
                    && std::env::var("NO_COLOR").is_err()
            }
        }
    }
}

/// Initialize the logging system with the given configuration
pub fn init_logging(config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::new(format!("tinkerbox={}", config.level));

    match config.format {
        LogFormat::Pretty => init_pretty_logging(config, env_filter),
        LogFormat::Json => init_json_logging(config, env_filter),
        LogFormat::Compact => init_compact_logging(config, env_filter),
    }?;

    Ok(())
}

fn init_pretty_logging(config: LogConfig, env_filter: EnvFilter) -> Result<()> {
    fmt()
        .with_env_filter(env_filter)
        .with_target(config.show_targets)
        .try_init()
        .map_err(subscriber_error)?;

    Ok(())
}

fn init_json_logging(_config: LogConfig, env_filter: EnvFilter) -> Result<()> {
    fmt()
        .with_env_filter(env_filter)
        .json()
        .try_init()
        .map_err(subscriber_error)?;

    Ok(())
}

fn init_compact_logging(config: LogConfig, env_filter: EnvFilter) -> Result<()> {
    fmt()
        .with_env_filter(env_filter)
        .compact()
        .with_target(config.show_targets)
        .try_init()
        .map_err(subscriber_error)?;

    Ok(())
}

fn subscriber_error(
    error: Box<dyn std::error::Error + Send + Sync>,
) -> crate::error::TinkerError {
    crate::error::TinkerError::Io(io::Error::new(io::ErrorKind::Other, error.to_string()))
}

/// Logging utilities for common operations
pub mod utils {
    use tracing::{debug, error, info, span, Level, Span};

    /// Create a span for one engine run
    pub fn engine_run_span(generation: u64) -> Span {
        span!(Level::INFO, "engine_run", generation = generation)
    }

    /// Create a span for a resource load attempt
    pub fn resource_load_span(resource_id: &str) -> Span {
        span!(Level::DEBUG, "resource_load", resource_id = %resource_id)
    }

    /// Create a span for vendor resolution
    pub fn vendor_span(key: &str, mirror_count: usize) -> Span {
        span!(Level::DEBUG, "vendor_load", key = %key, mirror_count = mirror_count)
    }

    /// Log the start of a slot compilation
    pub fn log_compile_start(slot: &str, language: &str) {
        debug!(slot = %slot, language = %language, "Compiling slot source");
    }

    /// Log slot compilation completion
    pub fn log_compile_completion(slot: &str, success: bool, duration_ms: u128) {
        if success {
            info!(
                slot = %slot,
                duration_ms = duration_ms,
                "Slot compilation completed"
            );
        } else {
            error!(
                slot = %slot,
                duration_ms = duration_ms,
                "Slot compilation failed"
            );
        }
    }

    /// Log sandbox instance replacement
    pub fn log_sandbox_replaced(instance_id: &str, generation: u64) {
        debug!(
            instance_id = %instance_id,
            generation = generation,
            "Sandbox instance replaced"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.color, ColorConfig::Auto);
        assert!(!config.show_targets);
        assert!(!config.show_timestamps);
    }

    #[test]
    fn test_log_config_from_cli_verbose() {
        let config = LogConfig::from_cli(true, false, None);
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.color, ColorConfig::Auto);
    }

    #[test]
    fn test_log_config_from_cli_quiet() {
        let config = LogConfig::from_cli(false, true, None);
        assert_eq!(config.level, Level::ERROR);
    }

    #[test]
    fn test_log_config_color_always() {
        let config = LogConfig::from_cli(false, false, Some("always".to_string()));
        assert_eq!(config.color, ColorConfig::Always);
        assert!(config.should_use_colors());
    }

    #[test]
    fn test_log_config_color_never() {
        let config = LogConfig::from_cli(false, false, Some("never".to_string()));
        assert_eq!(config.color, ColorConfig::Never);
        assert!(!config.should_use_colors());
    }
}
