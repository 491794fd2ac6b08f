//! In-memory market data source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{MarketDataError, MarketDataPort};
use crate::domain::{PriceRecord, RatingRecord, TimeWindow};

/// In-memory implementation of `MarketDataPort`.
///
/// Counts fetches so tests can assert how often the cache fell through to
/// the source.
#[derive(Debug, Default)]
pub struct InMemoryMarketData {
    ratings: RwLock<HashMap<String, Vec<RatingRecord>>>,
    prices: RwLock<HashMap<String, Vec<PriceRecord>>>,
    latency: Duration,
    rating_fetches: AtomicU64,
    price_fetches: AtomicU64,
}

impl InMemoryMarketData {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Replace the rating history for `symbol`.
    pub fn insert_ratings(&self, symbol: &str, mut records: Vec<RatingRecord>) {
        records.sort_by_key(|r| r.timestamp);
        self.ratings.write().insert(symbol.to_string(), records);
    }

    /// Replace the price history for `symbol`.
    pub fn insert_prices(&self, symbol: &str, mut records: Vec<PriceRecord>) {
        records.sort_by_key(|r| r.timestamp);
        self.prices.write().insert(symbol.to_string(), records);
    }

    /// Load records of any symbol, grouping them by their own symbol field.
    pub fn extend(&self, ratings: Vec<RatingRecord>, prices: Vec<PriceRecord>) {
        let mut grouped: HashMap<String, Vec<RatingRecord>> = HashMap::new();
        for record in ratings {
            grouped.entry(record.symbol.clone()).or_default().push(record);
        }
        for (symbol, records) in grouped {
            self.insert_ratings(&symbol, records);
        }

        let mut grouped: HashMap<String, Vec<PriceRecord>> = HashMap::new();
        for record in prices {
            grouped.entry(record.symbol.clone()).or_default().push(record);
        }
        for (symbol, records) in grouped {
            self.insert_prices(&symbol, records);
        }
    }

    /// Symbols with rating history.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.ratings.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Rating fetches served so far.
    #[must_use]
    pub fn rating_fetches(&self) -> u64 {
        self.rating_fetches.load(Ordering::Relaxed)
    }

    /// Price fetches served so far.
    #[must_use]
    pub fn price_fetches(&self) -> u64 {
        self.price_fetches.load(Ordering::Relaxed)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn knows(&self, symbol: &str) -> bool {
        self.ratings.read().contains_key(symbol) || self.prices.read().contains_key(symbol)
    }
}

#[async_trait]
impl MarketDataPort for InMemoryMarketData {
    async fn get_ratings(
        &self,
        symbol: &str,
        window: TimeWindow,
    ) -> Result<Vec<RatingRecord>, MarketDataError> {
        self.rating_fetches.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;

        let ratings = self.ratings.read();
        let Some(records) = ratings.get(symbol) else {
            return Err(MarketDataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        };
        Ok(records
            .iter()
            .filter(|r| window.contains(r.timestamp))
            .cloned()
            .collect())
    }

    async fn get_prices(
        &self,
        symbol: &str,
        window: TimeWindow,
    ) -> Result<Vec<PriceRecord>, MarketDataError> {
        self.price_fetches.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;

        if !self.knows(symbol) {
            return Err(MarketDataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(self
            .prices
            .read()
            .get(symbol)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| window.contains(r.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(timestamp: i64) -> RatingRecord {
        RatingRecord {
            symbol: "ETHUSDT".to_string(),
            timestamp,
            rating: 1_500.0,
            rating_deviation: 100.0,
            volatility: 0.06,
        }
    }

    #[tokio::test]
    async fn test_ratings_filtered_by_window() {
        let data = InMemoryMarketData::new();
        data.extend(vec![rating(30), rating(10), rating(20)], Vec::new());

        let Ok(records) = data.get_ratings("ETHUSDT", TimeWindow::new(10, 20)).await else {
            panic!("ratings should be found");
        };
        let timestamps: Vec<i64> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20]);
        assert_eq!(data.rating_fetches(), 1);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let data = InMemoryMarketData::new();
        let result = data.get_ratings("XRPUSDT", TimeWindow::new(0, 1)).await;
        assert!(matches!(result, Err(MarketDataError::SymbolNotFound { .. })));
    }

    #[tokio::test]
    async fn test_missing_prices_are_empty_for_known_symbol() {
        let data = InMemoryMarketData::new();
        data.insert_ratings("ETHUSDT", vec![rating(1)]);
        let Ok(prices) = data.get_prices("ETHUSDT", TimeWindow::new(0, 10)).await else {
            panic!("known symbol should return prices");
        };
        assert!(prices.is_empty());
    }
}
