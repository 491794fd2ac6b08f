//! Cache warmer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::default_true;

/// Cache warmer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmerConfig {
    /// Warm the cache before dispatch.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Symbols fetched concurrently.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Z-score window sizes always precomputed.
    #[serde(default = "default_common_windows")]
    pub common_windows: Vec<usize>,
    /// Background refresh interval in seconds (0 disables refresh).
    #[serde(default)]
    pub refresh_interval_secs: u64,
    /// Age in seconds after which a warmed series is refreshed.
    #[serde(default = "default_staleness")]
    pub staleness_secs: u64,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fetch_concurrency: default_fetch_concurrency(),
            common_windows: default_common_windows(),
            refresh_interval_secs: 0,
            staleness_secs: default_staleness(),
        }
    }
}

impl WarmerConfig {
    /// Background refresh interval, if enabled.
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

const fn default_fetch_concurrency() -> usize {
    4
}

fn default_common_windows() -> Vec<usize> {
    vec![20, 50, 100, 200]
}

const fn default_staleness() -> u64 {
    900
}
