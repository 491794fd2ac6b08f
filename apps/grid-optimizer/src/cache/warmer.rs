//! Cache pre-population ahead of dispatch.
//!
//! Every combination in a run reads the same rating and price series, so the
//! warmer fetches them once per symbol and stores them, together with the
//! rolling z-score series for each window size in use, before the first task
//! is dispatched.
//!
//! # Example
//!
//! ```rust,ignore
//! let warmer = CacheWarmer::new(cache, market_data, WarmerConfig::default());
//! let report = warmer.warm(&["BTCUSDT".to_string()], window, &[20, 50]).await;
//! assert!(report.failures.is_empty());
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::entry::{CacheTier, TierSelection};
use super::keys::{prices_key, ratings_key, zscore_key};
use super::tiered::TieredCache;
use crate::application::ports::{MarketDataError, MarketDataPort};
use crate::config::WarmerConfig;
use crate::domain::{RatingRecord, TimeWindow, ZScorePoint};
use crate::strategy::rolling_z_scores;

/// Symbol that could not be warmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmFailure {
    /// Symbol.
    pub symbol: String,
    /// Error message.
    pub error: String,
}

/// Outcome of a warm pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmReport {
    /// Symbols whose series are now cached.
    pub warmed: Vec<String>,
    /// Symbols that failed.
    pub failures: Vec<WarmFailure>,
    /// Cache entries written.
    pub entries_written: usize,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

impl WarmReport {
    /// Whether no symbol was warmed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warmed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WarmTarget {
    symbol: String,
    window: TimeWindow,
    moving_averages: Vec<usize>,
}

/// Pre-populates the cache from a market data source.
pub struct CacheWarmer {
    cache: Arc<TieredCache>,
    market_data: Arc<dyn MarketDataPort>,
    config: WarmerConfig,
    targets: Mutex<Vec<WarmTarget>>,
}

impl std::fmt::Debug for CacheWarmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWarmer")
            .field("config", &self.config)
            .field("targets", &self.targets.lock().len())
            .finish_non_exhaustive()
    }
}

impl CacheWarmer {
    /// Create a warmer.
    #[must_use]
    pub fn new(
        cache: Arc<TieredCache>,
        market_data: Arc<dyn MarketDataPort>,
        config: WarmerConfig,
    ) -> Self {
        Self {
            cache,
            market_data,
            config,
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Cache being warmed.
    #[must_use]
    pub const fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Whether warming runs before dispatch.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Fetch and cache the series for `symbols` over `window`.
    ///
    /// Z-score series are computed for the configured common window sizes
    /// plus `moving_averages`. Failures are reported per symbol.
    pub async fn warm(
        &self,
        symbols: &[String],
        window: TimeWindow,
        moving_averages: &[usize],
    ) -> WarmReport {
        let started = Instant::now();
        let windows = self.window_sizes(moving_averages);
        let concurrency = self.config.fetch_concurrency.max(1);

        let outcomes: Vec<(String, Result<usize, MarketDataError>)> =
            futures::stream::iter(symbols.iter().cloned())
                .map(|symbol| {
                    let windows = windows.clone();
                    async move {
                        let outcome = self.warm_symbol(&symbol, window, windows).await;
                        (symbol, outcome)
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut report = WarmReport::default();
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(entries) => {
                    report.entries_written += entries;
                    self.remember(&symbol, window, moving_averages);
                    report.warmed.push(symbol);
                }
                Err(err) => {
                    tracing::warn!(symbol = %symbol, error = %err, "Failed to warm cache");
                    report.failures.push(WarmFailure {
                        symbol,
                        error: err.to_string(),
                    });
                }
            }
        }
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            warmed = report.warmed.len(),
            failed = report.failures.len(),
            entries = report.entries_written,
            elapsed_ms = report.elapsed_ms,
            "Cache warm complete"
        );
        report
    }

    /// Re-warm previously warmed targets whose rating series is missing or
    /// older than the configured staleness.
    pub async fn refresh_stale(&self) -> WarmReport {
        let staleness = Duration::from_secs(self.config.staleness_secs);
        let stale: Vec<WarmTarget> = self
            .targets
            .lock()
            .iter()
            .filter(|target| {
                self.cache
                    .age_of(&ratings_key(&target.symbol, target.window))
                    .is_none_or(|age| age >= staleness)
            })
            .cloned()
            .collect();

        let mut report = WarmReport::default();
        for target in stale {
            let partial = self
                .warm(
                    std::slice::from_ref(&target.symbol),
                    target.window,
                    &target.moving_averages,
                )
                .await;
            report.warmed.extend(partial.warmed);
            report.failures.extend(partial.failures);
            report.entries_written += partial.entries_written;
            report.elapsed_ms += partial.elapsed_ms;
        }
        report
    }

    /// Run [`Self::refresh_stale`] every `interval` until `shutdown` fires.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let warmer = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = warmer.refresh_stale().await;
                        if !report.warmed.is_empty() {
                            tracing::debug!(refreshed = report.warmed.len(), "Refreshed stale cache entries");
                        }
                    }
                    () = shutdown.cancelled() => {
                        tracing::debug!("Cache refresh shutting down");
                        break;
                    }
                }
            }
        })
    }

    fn window_sizes(&self, moving_averages: &[usize]) -> Vec<usize> {
        let mut windows: Vec<usize> = self
            .config
            .common_windows
            .iter()
            .chain(moving_averages)
            .copied()
            .filter(|w| *w > 0)
            .collect();
        windows.sort_unstable();
        windows.dedup();
        windows
    }

    fn remember(&self, symbol: &str, window: TimeWindow, moving_averages: &[usize]) {
        let mut targets = self.targets.lock();
        let target = WarmTarget {
            symbol: symbol.to_string(),
            window,
            moving_averages: moving_averages.to_vec(),
        };
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    async fn warm_symbol(
        &self,
        symbol: &str,
        window: TimeWindow,
        windows: Vec<usize>,
    ) -> Result<usize, MarketDataError> {
        let ratings = self.market_data.get_ratings(symbol, window).await?;
        if ratings.is_empty() {
            return Err(MarketDataError::DataUnavailable {
                message: format!("no ratings for {symbol} in window"),
            });
        }
        let prices = self.market_data.get_prices(symbol, window).await?;

        let mut written = 0;
        written += usize::from(self.store(&ratings_key(symbol, window), &ratings, TierSelection::Auto));
        written += usize::from(self.store(&prices_key(symbol, window), &prices, TierSelection::Auto));

        let series = compute_series(ratings, windows).await?;
        for (moving_average, points) in &series {
            written += usize::from(self.store(
                &zscore_key(symbol, window, *moving_average),
                points,
                TierSelection::Tier(CacheTier::Compute),
            ));
        }

        tracing::debug!(symbol = %symbol, entries = written, "Warmed symbol");
        Ok(written)
    }

    fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T, selection: TierSelection) -> bool {
        match self.cache.set(key, value, selection, None) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Failed to cache warmed series");
                false
            }
        }
    }
}

async fn compute_series(
    ratings: Vec<RatingRecord>,
    windows: Vec<usize>,
) -> Result<Vec<(usize, Vec<ZScorePoint>)>, MarketDataError> {
    tokio::task::spawn_blocking(move || {
        windows
            .par_iter()
            .map(|w| (*w, rolling_z_scores(&ratings, *w)))
            .collect()
    })
    .await
    .map_err(|e| MarketDataError::DataUnavailable {
        message: format!("z-score computation failed: {e}"),
    })
}
