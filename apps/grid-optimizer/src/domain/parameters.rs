//! Strategy parameter combinations and the context they share.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive time range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start (epoch ms).
    pub start: i64,
    /// Window end (epoch ms).
    pub end: i64,
}

impl TimeWindow {
    /// Create a new window.
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Whether `timestamp` falls inside the window.
    #[must_use]
    pub const fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Window length in milliseconds.
    #[must_use]
    pub const fn duration_ms(&self) -> i64 {
        self.end - self.start
    }
}

/// Context shared by every combination in a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedContext {
    /// Base asset (e.g., "BTC").
    pub base_asset: String,
    /// Quote asset (e.g., "USDT").
    pub quote_asset: String,
    /// Backtest window.
    pub window: TimeWindow,
}

impl SharedContext {
    /// Trading pair symbol, e.g. "BTCUSDT".
    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base_asset, self.quote_asset)
    }
}

/// One point of the search grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterCombination {
    /// Z-score entry threshold.
    pub threshold: f64,
    /// Take-profit distance in percent.
    pub profit_percent: f64,
    /// Stop-loss distance in percent.
    pub stop_loss_percent: f64,
    /// Moving-average length for the rolling z-score.
    pub moving_average: usize,
    /// Shared run context.
    pub context: SharedContext,
}

impl ParameterCombination {
    /// Compact label used in logs and summaries.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "z={} tp={}% sl={}% ma={}",
            self.threshold, self.profit_percent, self.stop_loss_percent, self.moving_average
        )
    }
}

impl fmt::Display for ParameterCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.label(), self.context.symbol())
    }
}
