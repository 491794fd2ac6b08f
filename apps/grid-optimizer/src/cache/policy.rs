//! Tier placement, promotion and demotion rules.
//!
//! The policy is pure: it looks only at tier, size and access counts, and
//! knows nothing about payload encoding.
//!
//! | Event | Rule |
//! |-------|------|
//! | `set` with auto tier | hot below `hot_max_bytes`, warm below `warm_max_bytes`, else cold |
//! | warm hit | promote to hot when `access_count > warm_promotion_threshold` |
//! | cold hit | promote to warm when `access_count > cold_promotion_threshold` |
//! | hot TTL expiry | demote to warm when `access_count > demotion_access_threshold` |
//! | any other expiry | drop |

use serde::{Deserialize, Serialize};

use super::entry::CacheTier;

/// What to do after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitAction {
    /// Keep the entry where it is.
    Stay,
    /// Move the entry to a faster tier.
    Promote(CacheTier),
}

/// What to do with an expired entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryAction {
    /// Discard the entry.
    Drop,
    /// Move the entry to a slower tier with a fresh TTL.
    Demote(CacheTier),
}

/// Promotion/demotion thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Payloads below this size go to hot.
    pub hot_max_bytes: usize,
    /// Payloads below this size (and not hot) go to warm.
    pub warm_max_bytes: usize,
    /// Warm hits needed before promotion to hot.
    pub warm_promotion_threshold: u64,
    /// Cold hits needed before promotion to warm.
    pub cold_promotion_threshold: u64,
    /// Hot reads above which an expired entry is demoted instead of dropped.
    pub demotion_access_threshold: u64,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            hot_max_bytes: 100 * 1024,
            warm_max_bytes: 1024 * 1024,
            warm_promotion_threshold: 10,
            cold_promotion_threshold: 3,
            demotion_access_threshold: 5,
        }
    }
}

impl TierPolicy {
    /// Tier for a serialized payload of `size_bytes`.
    #[must_use]
    pub const fn select_tier(&self, size_bytes: usize) -> CacheTier {
        if size_bytes < self.hot_max_bytes {
            CacheTier::Hot
        } else if size_bytes < self.warm_max_bytes {
            CacheTier::Warm
        } else {
            CacheTier::Cold
        }
    }

    /// Decide promotion after a hit that brought the count to `access_count`.
    #[must_use]
    pub const fn on_hit(&self, tier: CacheTier, access_count: u64) -> HitAction {
        match tier {
            CacheTier::Warm if access_count > self.warm_promotion_threshold => {
                HitAction::Promote(CacheTier::Hot)
            }
            CacheTier::Cold if access_count > self.cold_promotion_threshold => {
                HitAction::Promote(CacheTier::Warm)
            }
            _ => HitAction::Stay,
        }
    }

    /// Decide what happens to an entry whose TTL elapsed.
    #[must_use]
    pub const fn on_expiry(&self, tier: CacheTier, access_count: u64) -> ExpiryAction {
        match tier {
            CacheTier::Hot if access_count > self.demotion_access_threshold => {
                ExpiryAction::Demote(CacheTier::Warm)
            }
            _ => ExpiryAction::Drop,
        }
    }
}
