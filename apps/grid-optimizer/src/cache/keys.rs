//! Cache key layout for shared series.

use crate::domain::TimeWindow;

/// Key for a symbol's rating history over `window`.
#[must_use]
pub fn ratings_key(symbol: &str, window: TimeWindow) -> String {
    format!("ratings:{symbol}:{}:{}", window.start, window.end)
}

/// Key for a symbol's price history over `window`.
#[must_use]
pub fn prices_key(symbol: &str, window: TimeWindow) -> String {
    format!("prices:{symbol}:{}:{}", window.start, window.end)
}

/// Key for the rolling z-score series of a symbol's ratings.
#[must_use]
pub fn zscore_key(symbol: &str, window: TimeWindow, moving_average: usize) -> String {
    format!(
        "zscore:{symbol}:{}:{}:{moving_average}",
        window.start, window.end
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_distinct_per_series() {
        let window = TimeWindow::new(10, 20);
        assert_eq!(ratings_key("BTCUSDT", window), "ratings:BTCUSDT:10:20");
        assert_eq!(prices_key("BTCUSDT", window), "prices:BTCUSDT:10:20");
        assert_eq!(zscore_key("BTCUSDT", window, 50), "zscore:BTCUSDT:10:20:50");
    }
}
