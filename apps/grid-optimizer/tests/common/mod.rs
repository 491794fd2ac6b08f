//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use grid_optimizer::application::ports::{BacktestInputs, BacktestPort, ComputeError};
use grid_optimizer::cache::TieredCache;
use grid_optimizer::config::{CacheConfig, RetryBackoffConfig, SchedulerConfig};
use grid_optimizer::domain::{
    ParameterCombination, PerformanceMetrics, RatingRecord, SharedContext, TimeWindow,
};
use grid_optimizer::engine::UnitContext;
use grid_optimizer::infrastructure::InMemoryMarketData;

pub const SYMBOL: &str = "BTCUSDT";
pub const WINDOW: TimeWindow = TimeWindow::new(0, 1_000_000);

pub fn context() -> SharedContext {
    SharedContext {
        base_asset: "BTC".to_string(),
        quote_asset: "USDT".to_string(),
        window: WINDOW,
    }
}

/// Combinations that differ only by threshold: 0.5, 1.0, 1.5, ...
pub fn combinations(count: usize) -> Vec<ParameterCombination> {
    (0..count)
        .map(|i| ParameterCombination {
            threshold: 0.5 * (i + 1) as f64,
            profit_percent: 5.0,
            stop_loss_percent: 2.0,
            moving_average: 5,
            context: context(),
        })
        .collect()
}

/// Sawtooth rating history inside `WINDOW`.
pub fn ratings(count: usize) -> Vec<RatingRecord> {
    (0..count)
        .map(|i| RatingRecord {
            symbol: SYMBOL.to_string(),
            timestamp: (i as i64 + 1) * 1_000,
            rating: 1_500.0 + ((i % 11) as f64 - 5.0) * 8.0,
            rating_deviation: 90.0,
            volatility: 0.06,
        })
        .collect()
}

pub fn market_data() -> Arc<InMemoryMarketData> {
    let data = InMemoryMarketData::new();
    data.insert_ratings(SYMBOL, ratings(60));
    Arc::new(data)
}

pub fn scheduler_config(workers: usize, max_retries: u32) -> SchedulerConfig {
    SchedulerConfig {
        fixed_workers: Some(workers),
        max_retries,
        retry_backoff: RetryBackoffConfig {
            initial_backoff_ms: 0,
            ..RetryBackoffConfig::default()
        },
        progress_interval_secs: 0,
        ..SchedulerConfig::default()
    }
}

pub fn unit_context(backtest: Arc<dyn BacktestPort>) -> UnitContext {
    UnitContext {
        cache: Arc::new(TieredCache::new(&CacheConfig::default())),
        market_data: market_data(),
        backtest,
    }
}

pub fn metrics_for(combination: &ParameterCombination) -> PerformanceMetrics {
    PerformanceMetrics {
        sharpe_ratio: combination.threshold,
        total_trades: 1,
        ..PerformanceMetrics::default()
    }
}

/// Backtest that sleeps, tracks concurrency and can be told to misbehave.
#[derive(Debug, Default)]
pub struct ScriptedBacktest {
    delay: Duration,
    /// Threshold whose every attempt fails with a transient error.
    always_fail: Option<f64>,
    /// Threshold whose every attempt is rejected as invalid.
    invalid: Option<f64>,
    /// Threshold whose first attempt panics mid-computation.
    crash_once: Option<f64>,
    /// Every attempt panics.
    always_crash: bool,
    crashed: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<f64>>,
}

impl ScriptedBacktest {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing(threshold: f64) -> Self {
        Self {
            always_fail: Some(threshold),
            ..Self::default()
        }
    }

    pub fn rejecting(threshold: f64) -> Self {
        Self {
            invalid: Some(threshold),
            ..Self::default()
        }
    }

    pub fn crashing_once(threshold: f64) -> Self {
        Self {
            crash_once: Some(threshold),
            ..Self::default()
        }
    }

    pub fn always_crashing() -> Self {
        Self {
            always_crash: true,
            ..Self::default()
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, threshold: f64) -> usize {
        self.calls.lock().iter().filter(|t| **t == threshold).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BacktestPort for ScriptedBacktest {
    async fn compute(
        &self,
        combination: &ParameterCombination,
        _inputs: &BacktestInputs,
    ) -> Result<PerformanceMetrics, ComputeError> {
        self.calls.lock().push(combination.threshold);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.always_crash {
            panic!("backtest crashed");
        }
        if self.crash_once == Some(combination.threshold)
            && !self.crashed.swap(true, Ordering::SeqCst)
        {
            panic!("backtest crashed once");
        }
        if self.always_fail == Some(combination.threshold) {
            return Err(ComputeError::failed("synthetic failure"));
        }
        if self.invalid == Some(combination.threshold) {
            return Err(ComputeError::InvalidParameters {
                message: "rejected".to_string(),
            });
        }
        Ok(metrics_for(combination))
    }
}
