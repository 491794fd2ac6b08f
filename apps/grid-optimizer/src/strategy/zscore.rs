//! Z-score mean-reversion backtest.
//!
//! Enters long when the rating z-score rises above `threshold`, exits when it
//! falls below `-threshold` or when the take-profit or stop-loss price is
//! touched. Prices come from the price series when present; otherwise they
//! are simulated from the rating as `100 * rating / 1500`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::metrics;
use super::portfolio::{ExitReason, Portfolio};
use super::stats::rolling_z_scores;
use crate::application::ports::{BacktestInputs, BacktestPort, ComputeError};
use crate::domain::{ParameterCombination, PerformanceMetrics, PriceRecord, RatingRecord};

/// Reference rating used when simulating prices from ratings.
const BASE_RATING: f64 = 1_500.0;

/// Simulation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZScoreBacktestConfig {
    /// Starting cash.
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    /// Fraction of cash committed per entry.
    #[serde(default = "default_allocation")]
    pub allocation: f64,
}

const fn default_initial_cash() -> f64 {
    10_000.0
}

const fn default_allocation() -> f64 {
    0.95
}

impl Default for ZScoreBacktestConfig {
    fn default() -> Self {
        Self {
            initial_cash: default_initial_cash(),
            allocation: default_allocation(),
        }
    }
}

/// Backtest adapter running the z-score strategy on a blocking thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZScoreBacktest {
    config: ZScoreBacktestConfig,
}

impl ZScoreBacktest {
    /// Create the adapter.
    #[must_use]
    pub const fn new(config: ZScoreBacktestConfig) -> Self {
        Self { config }
    }

    /// Reject combinations that can never produce a result.
    pub fn validate(combination: &ParameterCombination) -> Result<(), ComputeError> {
        let invalid = |message: String| Err(ComputeError::InvalidParameters { message });

        if !combination.threshold.is_finite() || combination.threshold <= 0.0 {
            return invalid(format!("threshold must be positive, got {}", combination.threshold));
        }
        if !combination.profit_percent.is_finite() || combination.profit_percent <= 0.0 {
            return invalid(format!(
                "profit_percent must be positive, got {}",
                combination.profit_percent
            ));
        }
        if !combination.stop_loss_percent.is_finite()
            || combination.stop_loss_percent <= 0.0
            || combination.stop_loss_percent >= 100.0
        {
            return invalid(format!(
                "stop_loss_percent must be in (0, 100), got {}",
                combination.stop_loss_percent
            ));
        }
        if combination.moving_average == 0 {
            return invalid("moving_average must be at least 1".to_string());
        }
        if combination.context.window.end <= combination.context.window.start {
            return invalid("time window is empty".to_string());
        }
        Ok(())
    }

    /// Run the simulation synchronously.
    #[must_use]
    pub fn run(
        &self,
        combination: &ParameterCombination,
        inputs: &BacktestInputs,
    ) -> PerformanceMetrics {
        let computed;
        let z_scores = if inputs.z_scores.is_empty() {
            computed = rolling_z_scores(&inputs.ratings, combination.moving_average);
            computed.as_slice()
        } else {
            inputs.z_scores.as_slice()
        };

        let prices = price_lookup(&inputs.prices, &inputs.ratings);
        let mut portfolio = Portfolio::new(self.config.initial_cash);
        let window = combination.context.window;

        for point in z_scores.iter().filter(|p| window.contains(p.timestamp)) {
            let Some(&price) = prices.get(&point.timestamp) else {
                continue;
            };

            if point.z_score > combination.threshold {
                let _ = portfolio.open(
                    price,
                    point.timestamp,
                    self.config.allocation,
                    combination.profit_percent,
                    combination.stop_loss_percent,
                );
            } else if point.z_score < -combination.threshold {
                let _ = portfolio.close(price, point.timestamp, ExitReason::Signal);
            }

            if let Some(reason) = portfolio.protective_exit(price) {
                let _ = portfolio.close(price, point.timestamp, reason);
            }
            portfolio.mark(point.timestamp, price);
        }

        metrics::calculate(&portfolio, window)
    }
}

fn price_lookup(prices: &[PriceRecord], ratings: &[RatingRecord]) -> HashMap<i64, f64> {
    if prices.is_empty() {
        ratings
            .iter()
            .map(|r| (r.timestamp, 100.0 * (r.rating / BASE_RATING)))
            .collect()
    } else {
        prices.iter().map(|p| (p.timestamp, p.close)).collect()
    }
}

#[async_trait]
impl BacktestPort for ZScoreBacktest {
    async fn compute(
        &self,
        combination: &ParameterCombination,
        inputs: &BacktestInputs,
    ) -> Result<PerformanceMetrics, ComputeError> {
        Self::validate(combination)?;

        let backtest = *self;
        let combination = combination.clone();
        let inputs = inputs.clone();
        match tokio::task::spawn_blocking(move || backtest.run(&combination, &inputs)).await {
            Ok(metrics) => Ok(metrics),
            // Surface panics on the calling task so the unit is seen as crashed.
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(ComputeError::failed(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SharedContext, TimeWindow};
    use std::sync::Arc;

    fn combination(threshold: f64, moving_average: usize) -> ParameterCombination {
        ParameterCombination {
            threshold,
            profit_percent: 5.0,
            stop_loss_percent: 2.0,
            moving_average,
            context: SharedContext {
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                window: TimeWindow::new(0, 100_000),
            },
        }
    }

    fn ratings(values: &[f64]) -> Vec<RatingRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| RatingRecord {
                symbol: "BTCUSDT".to_string(),
                timestamp: (i as i64 + 1) * 1_000,
                rating: *v,
                rating_deviation: 100.0,
                volatility: 0.06,
            })
            .collect()
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(ZScoreBacktest::validate(&combination(1.5, 3)).is_ok());
        assert!(matches!(
            ZScoreBacktest::validate(&combination(0.0, 3)),
            Err(ComputeError::InvalidParameters { .. })
        ));
        assert!(matches!(
            ZScoreBacktest::validate(&combination(1.0, 0)),
            Err(ComputeError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_breakout_then_take_profit() {
        // Entry on the first uptick, then a rally past +5%.
        let series = ratings(&[1_500.0, 1_501.0, 1_500.0, 1_501.0, 1_560.0, 1_650.0]);
        let inputs = BacktestInputs {
            ratings: Arc::new(series),
            ..BacktestInputs::default()
        };
        let metrics = ZScoreBacktest::default().run(&combination(1.0, 3), &inputs);

        assert_eq!(metrics.total_trades, 1);
        assert!(metrics.total_return > 0.0);
        assert!((metrics.win_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_signal_means_no_trades() {
        let series = ratings(&[1_500.0, 1_500.0, 1_500.0, 1_500.0, 1_500.0]);
        let inputs = BacktestInputs {
            ratings: Arc::new(series),
            ..BacktestInputs::default()
        };
        let metrics = ZScoreBacktest::default().run(&combination(2.0, 2), &inputs);
        assert_eq!(metrics.total_trades, 0);
        assert!(metrics.total_return.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_compute_rejects_invalid_before_running() {
        let result = ZScoreBacktest::default()
            .compute(&combination(-1.0, 3), &BacktestInputs::default())
            .await;
        assert!(matches!(result, Err(ComputeError::InvalidParameters { .. })));
    }
}
