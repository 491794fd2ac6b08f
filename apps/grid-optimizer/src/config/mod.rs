//! Configuration module for the grid optimizer.
//!
//! Loads YAML configuration with environment variable interpolation and
//! validates it before any engine component is built.
//!
//! # Usage
//!
//! ```rust,ignore
//! use grid_optimizer::config::{Config, load_config};
//!
//! // Load from default path (grid.yaml)
//! let config = load_config(None)?;
//!
//! // Access configuration values
//! println!("workers: {}", config.scheduler.pool_size());
//! ```

mod cache;
mod data;
mod grid;
mod observability;
mod scheduler;
mod warmer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::{CacheConfig, CompressionConfig, TierLimits};
pub use data::{DataConfig, SinkConfig, SinkKind};
pub use grid::{AxisConfig, GridConfig};
pub use observability::{LoggingConfig, MetricsConfig, ObservabilityConfig};
pub use scheduler::{RetryBackoffConfig, SchedulerConfig};
pub use warmer::WarmerConfig;

use crate::cache::CacheTier;
use crate::strategy::ZScoreBacktestConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Parameter grid.
    pub grid: GridConfig,
    /// Tiered cache.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Cache warmer.
    #[serde(default)]
    pub warmer: WarmerConfig,
    /// Scheduler and worker pool.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Reference backtest settings.
    #[serde(default)]
    pub backtest: ZScoreBacktestConfig,
    /// Market data source.
    #[serde(default)]
    pub data: DataConfig,
    /// Result sink.
    #[serde(default)]
    pub sink: SinkConfig,
    /// Observability.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

pub(crate) const fn default_true() -> bool {
    true
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "grid.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("grid.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    config.grid.validate().map_err(ConfigError::ValidationError)?;

    let cache = &config.cache;
    for tier in CacheTier::PROBE_ORDER {
        if cache.limits(tier).max_keys == 0 {
            return Err(ConfigError::ValidationError(format!(
                "cache.{tier}.max_keys must be positive"
            )));
        }
    }
    if cache.hot_max_bytes >= cache.warm_max_bytes {
        return Err(ConfigError::ValidationError(
            "cache.hot_max_bytes must be below cache.warm_max_bytes".to_string(),
        ));
    }
    if cache.compression.level > 9 {
        return Err(ConfigError::ValidationError(
            "cache.compression.level must be between 0 and 9".to_string(),
        ));
    }

    let scheduler = &config.scheduler;
    if scheduler.max_workers == 0 || scheduler.fixed_workers == Some(0) {
        return Err(ConfigError::ValidationError(
            "scheduler worker count must be positive".to_string(),
        ));
    }
    if scheduler.task_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.task_timeout_ms must be positive".to_string(),
        ));
    }
    let backoff = &scheduler.retry_backoff;
    if !(0.0..=1.0).contains(&backoff.jitter_factor) {
        return Err(ConfigError::ValidationError(
            "scheduler.retry_backoff.jitter_factor must be between 0.0 and 1.0".to_string(),
        ));
    }
    if backoff.multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "scheduler.retry_backoff.multiplier must be at least 1.0".to_string(),
        ));
    }

    if config.warmer.fetch_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "warmer.fetch_concurrency must be positive".to_string(),
        ));
    }

    let backtest = &config.backtest;
    if backtest.initial_cash <= 0.0 || !(0.0..=1.0).contains(&backtest.allocation) {
        return Err(ConfigError::ValidationError(
            "backtest.initial_cash must be positive and backtest.allocation in 0.0..=1.0"
                .to_string(),
        ));
    }

    let valid_formats = ["pretty", "json"];
    if !valid_formats.contains(&config.observability.logging.format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: {valid_formats:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r"
grid:
  base_asset: BTC
  start_time: 0
  end_time: 86400000
  thresholds: [1.5, 2.0]
  profit_percents: [5.0]
  stop_loss_percents: {start: 1.0, end: 3.0, step: 1.0}
";

    #[test]
    fn test_load_minimal_config() {
        let config = match load_config_from_string(MINIMAL) {
            Ok(c) => c,
            Err(e) => panic!("should load minimal config: {e}"),
        };
        assert_eq!(config.grid.quote_asset, "USDT");
        assert_eq!(config.grid.to_grid().total_combinations(), 6);
        assert_eq!(config.scheduler.max_retries, 3);
        assert_eq!(config.cache.hot.max_keys, 1_000);
        assert_eq!(config.sink.kind, SinkKind::None);
        assert!(config.warmer.enabled);
    }

    #[test]
    fn test_env_var_with_default_when_missing() {
        let input = "kind: ${GRID_CONFIG_TEST_NONEXISTENT_VAR:-memory}";
        assert_eq!(interpolate_env_vars(input), "kind: memory");
    }

    #[test]
    fn test_env_var_without_default_becomes_empty() {
        let input = "path: ${GRID_CONFIG_TEST_UNLIKELY_TO_EXIST}";
        assert_eq!(interpolate_env_vars(input), "path: ");
    }

    #[test]
    #[expect(clippy::literal_string_with_formatting_args)] // ${...} is env var syntax, not format args
    fn test_env_var_with_default_uses_existing() {
        let result = interpolate_env_vars("path: ${PATH:-default}");
        assert_ne!(result, "path: default");
        assert!(result.starts_with("path: "));
    }

    #[test]
    fn test_validation_rejects_inverted_window() {
        let yaml = MINIMAL.replace("end_time: 86400000", "end_time: -1");
        let Err(err) = load_config_from_string(&yaml) else {
            panic!("expected error for inverted window");
        };
        assert!(err.to_string().contains("end_time"));
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let yaml = format!("{MINIMAL}scheduler:\n  fixed_workers: 0\n");
        let Err(err) = load_config_from_string(&yaml) else {
            panic!("expected error for zero workers");
        };
        assert!(err.to_string().contains("worker"));
    }

    #[test]
    fn test_full_config_parse() {
        let yaml = format!(
            "{MINIMAL}{}",
            r"
cache:
  hot: {max_keys: 10, ttl_secs: 5}
  warm_promotion_threshold: 4
  compression:
    threshold_bytes: 2048
scheduler:
  fixed_workers: 4
  max_retries: 1
  task_timeout_ms: 500
  run_timeout_ms: 60000
  retry_backoff:
    initial_backoff_ms: 10
sink:
  kind: json_lines
  path: /tmp/results.jsonl
observability:
  logging:
    level: debug
    format: json
  metrics:
    enabled: true
    port: 9100
"
        );

        let config = match load_config_from_string(&yaml) {
            Ok(c) => c,
            Err(e) => panic!("should load full config: {e}"),
        };
        assert_eq!(config.cache.hot.max_keys, 10);
        assert_eq!(config.cache.warm_promotion_threshold, 4);
        assert_eq!(config.cache.compression.threshold_bytes, 2048);
        assert!(config.cache.compression.enabled);
        assert_eq!(config.scheduler.pool_size(), 4);
        assert_eq!(config.scheduler.run_timeout_ms, Some(60_000));
        assert_eq!(config.scheduler.retry_backoff.initial_backoff_ms, 10);
        assert_eq!(config.sink.kind, SinkKind::JsonLines);
        assert_eq!(config.observability.logging.format, "json");
        assert_eq!(config.observability.metrics.port, 9100);
    }
}
