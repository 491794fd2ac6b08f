//! Cache entries and tier identifiers.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Cache tier, ordered fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// Small, frequently read payloads.
    Hot,
    /// Medium payloads and demoted hot entries.
    Warm,
    /// Large payloads, optionally compressed.
    Cold,
    /// Derived computations (statistics series).
    Compute,
}

impl CacheTier {
    /// Probe order for lookups.
    pub const PROBE_ORDER: [Self; 4] = [Self::Hot, Self::Warm, Self::Cold, Self::Compute];

    /// Index into per-tier arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Hot => 0,
            Self::Warm => 1,
            Self::Cold => 2,
            Self::Compute => 3,
        }
    }

    /// Lowercase label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
            Self::Compute => "compute",
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier choice for a `set` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierSelection {
    /// Choose by payload size.
    #[default]
    Auto,
    /// Store in the given tier.
    Tier(CacheTier),
}

/// One cached value.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cache key.
    pub key: String,
    /// Stored bytes (compressed when `compressed`).
    pub payload: Arc<[u8]>,
    /// Stored size in bytes.
    pub size_bytes: usize,
    /// Serialized size before compression.
    pub original_size: usize,
    /// Whether `payload` is gzip data.
    pub compressed: bool,
    /// Tier currently holding the entry.
    pub tier: CacheTier,
    /// First insertion time.
    pub created_at: Instant,
    /// Time the entry entered its current tier; TTL counts from here.
    pub stored_at: Instant,
    /// Last successful read.
    pub last_accessed_at: Instant,
    /// Reads since the entry entered its current tier lineage.
    pub access_count: u64,
    /// Time to live in the current tier.
    pub ttl: Duration,
    /// Write generation, bumped on every `set`.
    pub generation: u64,
}

impl CacheEntry {
    /// Whether the TTL has elapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }

    /// Age since first insertion.
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Move the entry into `tier` with a fresh TTL.
    #[must_use]
    pub fn moved_to(mut self, tier: CacheTier, ttl: Duration, now: Instant) -> Self {
        self.tier = tier;
        self.ttl = ttl;
        self.stored_at = now;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ttl: Duration) -> CacheEntry {
        let now = Instant::now();
        CacheEntry {
            key: "k".to_string(),
            payload: Arc::from(vec![1_u8, 2, 3]),
            size_bytes: 3,
            original_size: 3,
            compressed: false,
            tier: CacheTier::Hot,
            created_at: now,
            stored_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl,
            generation: 1,
        }
    }

    #[test]
    fn test_expiry_counts_from_stored_at() {
        let e = entry(Duration::from_millis(10));
        let later = e.stored_at + Duration::from_millis(11);
        assert!(e.is_expired(later));
        let moved = e.moved_to(CacheTier::Warm, Duration::from_secs(60), later);
        assert!(!moved.is_expired(later));
        assert_eq!(moved.tier, CacheTier::Warm);
    }

    #[test]
    fn test_probe_order_indices() {
        let indices: Vec<usize> = CacheTier::PROBE_ORDER.iter().map(|t| t.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
