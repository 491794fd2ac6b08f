//! Tiered Cache
//!
//! Four in-memory tiers that keep execution units from re-fetching or
//! re-deriving the same input series.
//!
//! | Tier | Holds | Default placement |
//! |------|-------|-------------------|
//! | hot | small, frequently read payloads | serialized size < 100 KiB |
//! | warm | medium payloads, demoted hot entries | < 1 MiB |
//! | cold | large payloads, gzip above a threshold | everything else |
//! | compute | derived statistics | explicit only |
//!
//! Placement and movement rules live in [`policy`], compression in
//! [`codec`]; [`TieredCache`] composes the two.

mod codec;
mod entry;
mod error;
pub mod keys;
mod lru;
mod metrics;
mod policy;
mod tiered;
mod warmer;

pub use codec::{EncodedPayload, GzipCodec, PayloadCodec};
pub use entry::{CacheEntry, CacheTier, TierSelection};
pub use error::CacheError;
pub use self::metrics::{CacheMetrics, TierMetrics};
pub use policy::{ExpiryAction, HitAction, TierPolicy};
pub use tiered::{SweepReport, TieredCache};
pub use warmer::{CacheWarmer, WarmFailure, WarmReport};
