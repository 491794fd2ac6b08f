//! Four-tier in-memory cache.
//!
//! Lookups probe hot, warm, cold and compute in that order and return on the
//! first hit. Placement, promotion and demotion follow [`TierPolicy`]; payload
//! compression is delegated to a [`PayloadCodec`].
//!
//! All tier state lives behind a single lock so that every tier transition is
//! atomic with respect to concurrent readers. Serialization and compression
//! run outside the lock.
//!
//! # Example
//!
//! ```rust,ignore
//! let cache = TieredCache::new(&CacheConfig::default());
//! cache.set("ratings:BTCUSDT", &ratings, TierSelection::Auto, None)?;
//! let cached: Option<Vec<RatingRecord>> = cache.get("ratings:BTCUSDT");
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::codec::{GzipCodec, PayloadCodec};
use super::entry::{CacheEntry, CacheTier, TierSelection};
use super::error::CacheError;
use super::lru::LruTier;
use super::metrics::{CacheMetrics, Counters, TierMetrics};
use super::policy::{ExpiryAction, HitAction, TierPolicy};
use crate::config::CacheConfig;
use crate::observability::metrics as telemetry;

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries dropped.
    pub expired: usize,
    /// Entries moved to a slower tier.
    pub demoted: usize,
}

#[derive(Debug)]
struct Hit {
    payload: Arc<[u8]>,
    compressed: bool,
    generation: u64,
    tier: CacheTier,
}

#[derive(Debug)]
struct CacheState {
    tiers: [LruTier; 4],
    counters: Counters,
    generation: u64,
}

impl CacheState {
    fn tier(&self, tier: CacheTier) -> &LruTier {
        &self.tiers[tier.index()]
    }

    fn tier_mut(&mut self, tier: CacheTier) -> &mut LruTier {
        &mut self.tiers[tier.index()]
    }

    fn locate(&self, key: &str) -> Option<CacheTier> {
        CacheTier::PROBE_ORDER
            .into_iter()
            .find(|tier| self.tier(*tier).contains(key))
    }

    fn remove_everywhere(&mut self, key: &str) -> Option<CacheEntry> {
        let tier = self.locate(key)?;
        self.tier_mut(tier).remove(key)
    }

    fn place(&mut self, entry: CacheEntry) {
        let tier = entry.tier;
        let evicted = self.tier_mut(tier).insert(entry);
        if !evicted.is_empty() {
            self.counters.evictions += evicted.len() as u64;
            telemetry::record_cache_evictions(tier.as_str(), evicted.len());
            tracing::debug!(tier = %tier, evicted = evicted.len(), "Evicted least recently used entries");
        }
    }

    fn memory_bytes(&self) -> usize {
        self.tiers.iter().map(LruTier::memory_bytes).sum()
    }
}

/// Four-tier cache of serialized values.
#[derive(Debug)]
pub struct TieredCache {
    state: Mutex<CacheState>,
    policy: TierPolicy,
    codec: Arc<dyn PayloadCodec>,
    loads: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TieredCache {
    /// Build a cache from configuration with the gzip codec.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let codec = GzipCodec::new(
            config.compression.enabled,
            config.compression.threshold_bytes,
            config.compression.level,
        );
        Self::with_codec(config, Arc::new(codec))
    }

    /// Build a cache with a custom payload codec.
    #[must_use]
    pub fn with_codec(config: &CacheConfig, codec: Arc<dyn PayloadCodec>) -> Self {
        let tiers = CacheTier::PROBE_ORDER.map(|tier| {
            let limits = config.limits(tier);
            LruTier::new(limits.max_keys, limits.ttl())
        });
        Self {
            state: Mutex::new(CacheState {
                tiers,
                counters: Counters::default(),
                generation: 0,
            }),
            policy: config.policy(),
            codec,
            loads: Mutex::new(HashMap::new()),
        }
    }

    /// Tier placement rules in effect.
    #[must_use]
    pub const fn policy(&self) -> &TierPolicy {
        &self.policy
    }

    /// Look up `key`, deserializing into `T`.
    ///
    /// Returns `None` on a miss. A stored payload that fails to decode is
    /// evicted and also reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read(key, true)
    }

    /// Serialize `value` and store it under `key`.
    ///
    /// Any previous copy in any tier is removed first. Returns the tier that
    /// received the entry.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        selection: TierSelection,
        ttl: Option<Duration>,
    ) -> Result<CacheTier, CacheError> {
        let raw = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
            message: e.to_string(),
        })?;
        let tier = match selection {
            TierSelection::Auto => self.policy.select_tier(raw.len()),
            TierSelection::Tier(tier) => tier,
        };
        let encoded = self.codec.encode(raw, tier)?;
        let size_bytes = encoded.bytes.len();
        let now = Instant::now();

        let mut state = self.state.lock();
        state.generation += 1;
        let generation = state.generation;
        let ttl = ttl.unwrap_or_else(|| state.tier(tier).default_ttl());
        let _ = state.remove_everywhere(key);

        state.counters.bytes_written_original += encoded.original_size as u64;
        state.counters.bytes_written_stored += size_bytes as u64;
        if encoded.compressed {
            state.counters.compressed_writes += 1;
        }

        state.place(CacheEntry {
            key: key.to_string(),
            payload: Arc::from(encoded.bytes),
            size_bytes,
            original_size: encoded.original_size,
            compressed: encoded.compressed,
            tier,
            created_at: now,
            stored_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl,
            generation,
        });
        drop(state);

        tracing::trace!(
            key = %key,
            tier = %tier,
            size_bytes,
            original_size = encoded.original_size,
            compressed = encoded.compressed,
            "Cache set"
        );
        Ok(tier)
    }

    /// Return the cached value for `key`, running `loader` on a miss.
    ///
    /// Concurrent misses on the same key wait on a per-key lock so that the
    /// loader runs once; the waiters then read the freshly stored value.
    /// Loader errors are returned and nothing is cached.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &str,
        selection: TierSelection,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let gate = self.load_gate(key);
        let _guard = gate.lock.lock().await;

        if let Some(value) = self.read(key, false) {
            return Ok(value);
        }

        let value = loader().await?;
        if let Err(err) = self.set(key, &value, selection, None) {
            tracing::warn!(key = %key, error = %err, "Failed to cache loaded value");
        }
        Ok(value)
    }

    /// Remove `key` from whichever tier holds it.
    pub fn remove(&self, key: &str) -> bool {
        self.state.lock().remove_everywhere(key).is_some()
    }

    /// Whether any tier holds `key` (expired or not).
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().locate(key).is_some()
    }

    /// Tier currently holding `key`.
    #[must_use]
    pub fn tier_of(&self, key: &str) -> Option<CacheTier> {
        self.state.lock().locate(key)
    }

    /// Age of the entry under `key`.
    #[must_use]
    pub fn age_of(&self, key: &str) -> Option<Duration> {
        let state = self.state.lock();
        let tier = state.locate(key)?;
        state
            .tier(tier)
            .peek(key)
            .map(|entry| entry.age(Instant::now()))
    }

    /// Keys currently stored in `tier`.
    #[must_use]
    pub fn keys_in(&self, tier: CacheTier) -> Vec<String> {
        self.state
            .lock()
            .tier(tier)
            .keys()
            .map(str::to_string)
            .collect()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        for tier in &mut state.tiers {
            tier.clear();
        }
    }

    /// Estimated bytes held across all tiers.
    #[must_use]
    pub fn memory_usage_bytes(&self) -> usize {
        self.state.lock().memory_bytes()
    }

    /// Remove or demote every entry whose TTL elapsed.
    pub fn sweep_expired(&self) -> SweepReport {
        let now = Instant::now();
        let mut report = SweepReport::default();
        let mut state = self.state.lock();

        for tier in CacheTier::PROBE_ORDER {
            let expired = state.tier_mut(tier).drain_expired(now);
            for entry in expired {
                match self.settle_expired(&mut state, entry, now) {
                    ExpiryAction::Drop => report.expired += 1,
                    ExpiryAction::Demote(_) => report.demoted += 1,
                }
            }
        }
        drop(state);

        if report.expired > 0 || report.demoted > 0 {
            tracing::debug!(
                expired = report.expired,
                demoted = report.demoted,
                "Cache sweep finished"
            );
        }
        report
    }

    /// Run [`Self::sweep_expired`] every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = cache.sweep_expired();
                        telemetry::update_cache_memory(cache.memory_usage_bytes());
                    }
                    () = shutdown.cancelled() => {
                        tracing::debug!("Cache sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Snapshot of cache statistics.
    #[must_use]
    pub fn metrics(&self) -> CacheMetrics {
        let state = self.state.lock();
        let c = state.counters;
        let tiers = CacheTier::PROBE_ORDER.map(|tier| {
            let lru = state.tier(tier);
            TierMetrics {
                tier,
                entries: lru.len(),
                max_keys: lru.max_keys(),
                hits: c.tier_hits[tier.index()],
                misses: c.tier_misses[tier.index()],
                memory_bytes: lru.memory_bytes(),
            }
        });
        CacheMetrics {
            tiers,
            hits: c.hits,
            misses: c.misses,
            promotions: c.promotions,
            demotions: c.demotions,
            evictions: c.evictions,
            expirations: c.expirations,
            corruptions: c.corruptions,
            bytes_written_original: c.bytes_written_original,
            bytes_written_stored: c.bytes_written_stored,
            compressed_writes: c.compressed_writes,
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str, record: bool) -> Option<T> {
        let hit = self.lookup(key, record);
        if record {
            telemetry::record_cache_lookup(hit.as_ref().map(|h| h.tier));
        }
        let hit = hit?;

        match self.decode(&hit) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key = %key, tier = %hit.tier, error = %err, "Evicting corrupted cache entry");
                self.evict_corrupted(key, hit.generation, record);
                None
            }
        }
    }

    fn decode<T: DeserializeOwned>(&self, hit: &Hit) -> Result<T, CacheError> {
        let raw = self.codec.decode(&hit.payload, hit.compressed)?;
        serde_json::from_slice(&raw).map_err(|e| CacheError::Serialization {
            message: e.to_string(),
        })
    }

    fn lookup(&self, key: &str, record: bool) -> Option<Hit> {
        let now = Instant::now();
        let mut state = self.state.lock();

        for tier in CacheTier::PROBE_ORDER {
            let idx = tier.index();
            let expired = match state.tier(tier).peek(key) {
                Some(entry) => entry.is_expired(now),
                None => {
                    if record {
                        state.counters.tier_misses[idx] += 1;
                    }
                    continue;
                }
            };

            if expired {
                // Demotion may re-home the entry in a tier probed later.
                if let Some(entry) = state.tier_mut(tier).remove(key) {
                    let _ = self.settle_expired(&mut state, entry, now);
                }
                if record {
                    state.counters.tier_misses[idx] += 1;
                }
                continue;
            }

            let Some(entry) = state.tier_mut(tier).touch(key) else {
                continue;
            };
            entry.access_count += 1;
            entry.last_accessed_at = now;
            let access_count = entry.access_count;
            let hit = Hit {
                payload: Arc::clone(&entry.payload),
                compressed: entry.compressed,
                generation: entry.generation,
                tier,
            };

            if record {
                state.counters.tier_hits[idx] += 1;
                state.counters.hits += 1;
            }

            if let HitAction::Promote(target) = self.policy.on_hit(tier, access_count)
                && let Some(entry) = state.tier_mut(tier).remove(key)
            {
                let ttl = state.tier(target).default_ttl();
                state.place(entry.moved_to(target, ttl, now));
                state.counters.promotions += 1;
                tracing::trace!(key = %key, from = %tier, to = %target, "Promoted cache entry");
            }
            return Some(hit);
        }

        if record {
            state.counters.misses += 1;
        }
        None
    }

    fn settle_expired(
        &self,
        state: &mut CacheState,
        entry: CacheEntry,
        now: Instant,
    ) -> ExpiryAction {
        let action = self.policy.on_expiry(entry.tier, entry.access_count);
        match action {
            ExpiryAction::Demote(target) => {
                let ttl = state.tier(target).default_ttl();
                let mut demoted = entry.moved_to(target, ttl, now);
                demoted.access_count = 0;
                state.place(demoted);
                state.counters.demotions += 1;
            }
            ExpiryAction::Drop => state.counters.expirations += 1,
        }
        action
    }

    fn evict_corrupted(&self, key: &str, generation: u64, record: bool) {
        let mut state = self.state.lock();
        if let Some(tier) = state.locate(key)
            && state
                .tier(tier)
                .peek(key)
                .is_some_and(|entry| entry.generation == generation)
        {
            let _ = state.tier_mut(tier).remove(key);
        }
        state.counters.corruptions += 1;
        // A corrupt read counts as a miss.
        if record {
            state.counters.hits = state.counters.hits.saturating_sub(1);
            state.counters.misses += 1;
        }
    }

    fn load_gate(&self, key: &str) -> LoadGate<'_> {
        let lock = Arc::clone(
            self.loads
                .lock()
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        );
        LoadGate {
            loads: &self.loads,
            key: key.to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn corrupt_payload(&self, key: &str, bytes: Vec<u8>) {
        let mut state = self.state.lock();
        if let Some(tier) = state.locate(key)
            && let Some(entry) = state.tier_mut(tier).touch(key)
        {
            entry.payload = Arc::from(bytes);
        }
    }
}

/// Per-key load lock, removed from the map once no other caller holds it.
struct LoadGate<'a> {
    loads: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    key: String,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for LoadGate<'_> {
    fn drop(&mut self) {
        let mut loads = self.loads.lock();
        let idle = Arc::strong_count(&self.lock) <= 2;
        if idle
            && loads
                .get(&self.key)
                .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock))
        {
            loads.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompressionConfig, TierLimits};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> CacheConfig {
        CacheConfig::default()
    }

    fn small_hot_config(max_keys: usize) -> CacheConfig {
        CacheConfig {
            hot: TierLimits {
                max_keys,
                ttl_secs: 60,
            },
            ..CacheConfig::default()
        }
    }

    #[test]
    fn test_small_values_land_in_hot() {
        let cache = TieredCache::new(&config());
        for (key, value) in [("a", 1_u32), ("b", 2), ("c", 3)] {
            let Ok(tier) = cache.set(key, &value, TierSelection::Auto, None) else {
                panic!("set should succeed");
            };
            assert_eq!(tier, CacheTier::Hot);
        }

        let metrics = cache.metrics();
        assert_eq!(metrics.tier(CacheTier::Hot).entries, 3);
        assert_eq!(cache.get::<u32>("b"), Some(2));
    }

    #[test]
    fn test_miss_is_counted() {
        let cache = TieredCache::new(&config());
        assert_eq!(cache.get::<u32>("missing"), None);
        let metrics = cache.metrics();
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.hits, 0);
        assert_eq!(metrics.tier(CacheTier::Compute).misses, 1);
    }

    #[test]
    fn test_set_replaces_copy_in_other_tier() {
        let cache = TieredCache::new(&config());
        let _ = cache.set("k", &1_u32, TierSelection::Tier(CacheTier::Cold), None);
        let _ = cache.set("k", &2_u32, TierSelection::Tier(CacheTier::Hot), None);

        assert_eq!(cache.tier_of("k"), Some(CacheTier::Hot));
        assert_eq!(cache.metrics().entries(), 1);
        assert_eq!(cache.get::<u32>("k"), Some(2));
    }

    #[test]
    fn test_warm_entry_promotes_after_threshold() {
        let cache = TieredCache::new(&config());
        let _ = cache.set("k", &"v", TierSelection::Tier(CacheTier::Warm), None);

        for _ in 0..10 {
            assert_eq!(cache.get::<String>("k").as_deref(), Some("v"));
        }
        assert_eq!(cache.tier_of("k"), Some(CacheTier::Warm));

        let _ = cache.get::<String>("k");
        assert_eq!(cache.tier_of("k"), Some(CacheTier::Hot));
        assert_eq!(cache.metrics().promotions, 1);
    }

    #[test]
    fn test_cold_entry_promotes_to_warm() {
        let cache = TieredCache::new(&config());
        let _ = cache.set("k", &7_u64, TierSelection::Tier(CacheTier::Cold), None);
        for _ in 0..4 {
            assert_eq!(cache.get::<u64>("k"), Some(7));
        }
        assert_eq!(cache.tier_of("k"), Some(CacheTier::Warm));
    }

    #[test]
    fn test_capacity_evicts_lru() {
        let cache = TieredCache::new(&small_hot_config(2));
        let _ = cache.set("a", &1_u8, TierSelection::Auto, None);
        let _ = cache.set("b", &2_u8, TierSelection::Auto, None);
        let _ = cache.get::<u8>("a");
        let _ = cache.set("c", &3_u8, TierSelection::Auto, None);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.metrics().evictions, 1);
    }

    #[test]
    fn test_expired_hot_entry_with_few_reads_is_dropped() {
        let cache = TieredCache::new(&config());
        let _ = cache.set(
            "k",
            &1_u8,
            TierSelection::Auto,
            Some(Duration::from_millis(5)),
        );
        std::thread::sleep(Duration::from_millis(15));

        assert_eq!(cache.get::<u8>("k"), None);
        assert!(!cache.contains("k"));
        assert_eq!(cache.metrics().expirations, 1);
    }

    #[test]
    fn test_valuable_hot_entry_is_demoted_on_sweep() {
        let cache = TieredCache::new(&config());
        let _ = cache.set(
            "k",
            &1_u8,
            TierSelection::Auto,
            Some(Duration::from_millis(20)),
        );
        for _ in 0..6 {
            let _ = cache.get::<u8>("k");
        }
        std::thread::sleep(Duration::from_millis(30));

        let report = cache.sweep_expired();
        assert_eq!(report.demoted, 1);
        assert_eq!(cache.tier_of("k"), Some(CacheTier::Warm));
        assert_eq!(cache.get::<u8>("k"), Some(1));
    }

    #[test]
    fn test_compressed_round_trip() {
        let mut cfg = config();
        cfg.compression = CompressionConfig {
            enabled: true,
            threshold_bytes: 10 * 1024,
            level: 6,
        };
        let cache = TieredCache::new(&cfg);
        let payload: Vec<f64> = (0..300_000).map(|i| f64::from(i % 100)).collect();

        let Ok(tier) = cache.set("big", &payload, TierSelection::Auto, None) else {
            panic!("set should succeed");
        };
        assert_eq!(tier, CacheTier::Cold);

        let metrics = cache.metrics();
        assert_eq!(metrics.compressed_writes, 1);
        assert!(metrics.compression_ratio() < 1.0);
        assert_eq!(cache.get::<Vec<f64>>("big"), Some(payload));
    }

    #[test]
    fn test_corrupted_entry_is_evicted_and_missed() {
        let cache = TieredCache::new(&config());
        let _ = cache.set("k", &vec![1_u32, 2, 3], TierSelection::Auto, None);
        cache.corrupt_payload("k", b"{not json".to_vec());

        assert_eq!(cache.get::<Vec<u32>>("k"), None);
        assert!(!cache.contains("k"));
        let metrics = cache.metrics();
        assert_eq!(metrics.corruptions, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.hits, 0);
    }

    #[test]
    fn test_clear_and_memory() {
        let cache = TieredCache::new(&config());
        let _ = cache.set("k", &"payload", TierSelection::Auto, None);
        assert!(cache.memory_usage_bytes() > 0);
        cache.clear();
        assert_eq!(cache.memory_usage_bytes(), 0);
        assert!(!cache.remove("k"));
    }

    #[tokio::test]
    async fn test_get_or_load_runs_loader_once() {
        let cache = Arc::new(TieredCache::new(&config()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load("series", TierSelection::Auto, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, CacheError>(vec![1.0_f64, 2.0, 3.0])
                    })
                    .await
            }));
        }

        for handle in handles {
            let Ok(Ok(value)) = handle.await else {
                panic!("loader task should succeed");
            };
            assert_eq!(value, vec![1.0, 2.0, 3.0]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.loads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_load_error_is_not_cached() {
        let cache = TieredCache::new(&config());
        let result: Result<u32, String> = cache
            .get_or_load("k", TierSelection::Auto, || async { Err("boom".to_string()) })
            .await;
        assert!(result.is_err());
        assert!(!cache.contains("k"));
    }
}
