//! Cache statistics snapshots.

use serde::Serialize;

use super::entry::CacheTier;

/// Per-tier counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierMetrics {
    /// Tier.
    pub tier: CacheTier,
    /// Current entries.
    pub entries: usize,
    /// Capacity in keys.
    pub max_keys: usize,
    /// Reads served by this tier.
    pub hits: u64,
    /// Probes that did not find the key in this tier.
    pub misses: u64,
    /// Stored bytes.
    pub memory_bytes: usize,
}

/// Whole-cache counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMetrics {
    /// Per-tier counters in probe order.
    pub tiers: [TierMetrics; 4],
    /// Reads served by any tier.
    pub hits: u64,
    /// Reads served by no tier.
    pub misses: u64,
    /// Entries moved to a faster tier.
    pub promotions: u64,
    /// Entries moved to a slower tier on expiry.
    pub demotions: u64,
    /// Entries dropped for capacity.
    pub evictions: u64,
    /// Entries dropped on expiry.
    pub expirations: u64,
    /// Entries dropped because they failed to decode.
    pub corruptions: u64,
    /// Serialized bytes written by `set`.
    pub bytes_written_original: u64,
    /// Stored bytes written by `set`, after compression.
    pub bytes_written_stored: u64,
    /// Entries written compressed.
    pub compressed_writes: u64,
}

impl CacheMetrics {
    /// Hits over total reads, zero before any read.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Stored over original bytes; 1.0 means no savings.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_written_original == 0 {
            1.0
        } else {
            self.bytes_written_stored as f64 / self.bytes_written_original as f64
        }
    }

    /// Total stored bytes.
    #[must_use]
    pub fn memory_bytes(&self) -> usize {
        self.tiers.iter().map(|t| t.memory_bytes).sum()
    }

    /// Total entries.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.tiers.iter().map(|t| t.entries).sum()
    }

    /// Counters for one tier.
    #[must_use]
    pub const fn tier(&self, tier: CacheTier) -> &TierMetrics {
        &self.tiers[tier.index()]
    }
}

/// Running counters kept under the cache lock.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub(crate) tier_hits: [u64; 4],
    pub(crate) tier_misses: [u64; 4],
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) promotions: u64,
    pub(crate) demotions: u64,
    pub(crate) evictions: u64,
    pub(crate) expirations: u64,
    pub(crate) corruptions: u64,
    pub(crate) bytes_written_original: u64,
    pub(crate) bytes_written_stored: u64,
    pub(crate) compressed_writes: u64,
}
