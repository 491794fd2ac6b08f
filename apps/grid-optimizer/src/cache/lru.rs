//! Bounded LRU map with per-entry TTL.
//!
//! Recency is tracked with a monotonically increasing tick; the smallest tick
//! in `recency` is the least recently used key.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use super::entry::CacheEntry;

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    tick: u64,
}

/// One cache tier.
#[derive(Debug)]
pub(crate) struct LruTier {
    max_keys: usize,
    default_ttl: Duration,
    slots: HashMap<String, Slot>,
    recency: BTreeMap<u64, String>,
    tick: u64,
    memory_bytes: usize,
}

impl LruTier {
    pub(crate) fn new(max_keys: usize, default_ttl: Duration) -> Self {
        Self {
            max_keys: max_keys.max(1),
            default_ttl,
            slots: HashMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
            memory_bytes: 0,
        }
    }

    pub(crate) const fn max_keys(&self) -> usize {
        self.max_keys
    }

    pub(crate) const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) const fn memory_bytes(&self) -> usize {
        self.memory_bytes
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.slots.get(key).map(|slot| &slot.entry)
    }

    /// Mutable access that also marks the key most recently used.
    pub(crate) fn touch(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.tick += 1;
        let tick = self.tick;
        let slot = self.slots.get_mut(key)?;
        self.recency.remove(&slot.tick);
        self.recency.insert(tick, key.to_string());
        slot.tick = tick;
        Some(&mut slot.entry)
    }

    /// Insert an entry, returning whatever was evicted to make room.
    ///
    /// An existing entry under the same key is replaced and not reported.
    pub(crate) fn insert(&mut self, entry: CacheEntry) -> Vec<CacheEntry> {
        let _ = self.remove(&entry.key);

        let mut evicted = Vec::new();
        while self.slots.len() >= self.max_keys {
            match self.pop_lru() {
                Some(old) => evicted.push(old),
                None => break,
            }
        }

        self.tick += 1;
        let key = entry.key.clone();
        self.memory_bytes += entry.size_bytes;
        self.recency.insert(self.tick, key.clone());
        self.slots.insert(
            key,
            Slot {
                entry,
                tick: self.tick,
            },
        );
        evicted
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let slot = self.slots.remove(key)?;
        self.recency.remove(&slot.tick);
        self.memory_bytes = self.memory_bytes.saturating_sub(slot.entry.size_bytes);
        Some(slot.entry)
    }

    /// Remove and return every entry whose TTL elapsed at `now`.
    pub(crate) fn drain_expired(&mut self, now: Instant) -> Vec<CacheEntry> {
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        expired.iter().filter_map(|key| self.remove(key)).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.recency.clear();
        self.memory_bytes = 0;
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    fn pop_lru(&mut self) -> Option<CacheEntry> {
        let (_, key) = self.recency.pop_first()?;
        let slot = self.slots.remove(&key)?;
        self.memory_bytes = self.memory_bytes.saturating_sub(slot.entry.size_bytes);
        Some(slot.entry)
    }
}
