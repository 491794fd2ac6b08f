//! Market-data records consumed by backtests.

use serde::{Deserialize, Serialize};

/// Glicko-2 rating snapshot for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    /// Symbol (e.g., "BTCUSDT").
    pub symbol: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Rating.
    pub rating: f64,
    /// Rating deviation.
    pub rating_deviation: f64,
    /// Rating volatility.
    pub volatility: f64,
}

/// Close price for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Symbol.
    pub symbol: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Close price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
}

/// One point of a rolling z-score series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZScorePoint {
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Rolling mean of the window.
    pub mean: f64,
    /// Rolling population standard deviation.
    pub std_dev: f64,
    /// Z-score of the current value against the window.
    pub z_score: f64,
}
