//! `observability:` section of the optimizer YAML.
//!
//! Controls how run progress, retries and crashes are logged and whether the
//! engine's counters are served to Prometheus while a grid search runs.

use serde::{Deserialize, Serialize};

/// Logging and metrics settings for a grid search process.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Tracing subscriber settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Exporter for task, pool and cache metrics.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Tracing subscriber settings used by `init_tracing`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter applied when `RUST_LOG` is unset, e.g. `grid_optimizer=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` for terminals, `json` for one object per line.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// HTTP endpoint serving the engine's counters and gauges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Serve `/metrics` for the lifetime of the process.
    #[serde(default)]
    pub enabled: bool,
    /// Listen port on all interfaces.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_metrics_port() -> u16 {
    9090
}
