//! Performance metrics returned by a backtest.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Performance summary of one backtest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Total return (decimal, e.g., 0.15 = 15%).
    pub total_return: f64,
    /// Annualized return (decimal).
    pub annualized_return: f64,
    /// Sharpe ratio.
    pub sharpe_ratio: f64,
    /// Sortino ratio.
    pub sortino_ratio: f64,
    /// Maximum drawdown (positive decimal).
    pub max_drawdown: f64,
    /// Fraction of closed trades with positive P&L.
    pub win_ratio: f64,
    /// Number of closed trades.
    pub total_trades: usize,
    /// Gross profit / gross loss. Infinite with no losing trades.
    pub profit_factor: f64,
    /// Average holding period in hours.
    pub avg_trade_duration_hours: f64,
}

impl PerformanceMetrics {
    /// Ordering by Sharpe ratio; NaN sorts lowest.
    #[must_use]
    pub fn cmp_sharpe(&self, other: &Self) -> Ordering {
        sanitize(self.sharpe_ratio).total_cmp(&sanitize(other.sharpe_ratio))
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_nan() { f64::NEG_INFINITY } else { value }
}
