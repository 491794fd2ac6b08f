//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheTier, TierPolicy};

/// Capacity and TTL of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Maximum entries before LRU eviction.
    pub max_keys: usize,
    /// Default time to live in seconds.
    pub ttl_secs: u64,
}

impl TierLimits {
    /// Default TTL as a duration.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Payload compression configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Enable gzip for non-hot tiers.
    #[serde(default = "default_compression_enabled")]
    pub enabled: bool,
    /// Serialized size above which payloads are compressed.
    #[serde(default = "default_compression_threshold")]
    pub threshold_bytes: usize,
    /// Gzip level (0-9).
    #[serde(default = "default_compression_level")]
    pub level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: default_compression_enabled(),
            threshold_bytes: default_compression_threshold(),
            level: default_compression_level(),
        }
    }
}

/// Tiered cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Hot tier limits.
    #[serde(default = "default_hot")]
    pub hot: TierLimits,
    /// Warm tier limits.
    #[serde(default = "default_warm")]
    pub warm: TierLimits,
    /// Cold tier limits.
    #[serde(default = "default_cold")]
    pub cold: TierLimits,
    /// Compute tier limits.
    #[serde(default = "default_compute")]
    pub compute: TierLimits,
    /// Auto placement: payloads below this go to hot.
    #[serde(default = "default_hot_max_bytes")]
    pub hot_max_bytes: usize,
    /// Auto placement: payloads below this go to warm.
    #[serde(default = "default_warm_max_bytes")]
    pub warm_max_bytes: usize,
    /// Warm hits before promotion to hot.
    #[serde(default = "default_warm_promotion")]
    pub warm_promotion_threshold: u64,
    /// Cold hits before promotion to warm.
    #[serde(default = "default_cold_promotion")]
    pub cold_promotion_threshold: u64,
    /// Hot reads above which an expired entry is demoted to warm.
    #[serde(default = "default_demotion")]
    pub demotion_access_threshold: u64,
    /// Compression settings.
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Interval between expiry sweeps in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot: default_hot(),
            warm: default_warm(),
            cold: default_cold(),
            compute: default_compute(),
            hot_max_bytes: default_hot_max_bytes(),
            warm_max_bytes: default_warm_max_bytes(),
            warm_promotion_threshold: default_warm_promotion(),
            cold_promotion_threshold: default_cold_promotion(),
            demotion_access_threshold: default_demotion(),
            compression: CompressionConfig::default(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    /// Limits for `tier`.
    #[must_use]
    pub const fn limits(&self, tier: CacheTier) -> TierLimits {
        match tier {
            CacheTier::Hot => self.hot,
            CacheTier::Warm => self.warm,
            CacheTier::Cold => self.cold,
            CacheTier::Compute => self.compute,
        }
    }

    /// Placement policy built from the thresholds.
    #[must_use]
    pub const fn policy(&self) -> TierPolicy {
        TierPolicy {
            hot_max_bytes: self.hot_max_bytes,
            warm_max_bytes: self.warm_max_bytes,
            warm_promotion_threshold: self.warm_promotion_threshold,
            cold_promotion_threshold: self.cold_promotion_threshold,
            demotion_access_threshold: self.demotion_access_threshold,
        }
    }

    /// Sweep interval as a duration.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

const fn default_hot() -> TierLimits {
    TierLimits {
        max_keys: 1_000,
        ttl_secs: 300,
    }
}

const fn default_warm() -> TierLimits {
    TierLimits {
        max_keys: 5_000,
        ttl_secs: 1_800,
    }
}

const fn default_cold() -> TierLimits {
    TierLimits {
        max_keys: 10_000,
        ttl_secs: 7_200,
    }
}

const fn default_compute() -> TierLimits {
    TierLimits {
        max_keys: 2_000,
        ttl_secs: 3_600,
    }
}

const fn default_hot_max_bytes() -> usize {
    100 * 1024
}

const fn default_warm_max_bytes() -> usize {
    1024 * 1024
}

const fn default_warm_promotion() -> u64 {
    10
}

const fn default_cold_promotion() -> u64 {
    3
}

const fn default_demotion() -> u64 {
    5
}

const fn default_compression_enabled() -> bool {
    true
}

const fn default_compression_threshold() -> usize {
    10 * 1024
}

const fn default_compression_level() -> u32 {
    6
}

const fn default_sweep_interval() -> u64 {
    60
}
