//! Market data loaded from a JSON file.
//!
//! Expected layout:
//!
//! ```json
//! {
//!   "ratings": [{"symbol": "BTCUSDT", "timestamp": 0, "rating": 1500.0,
//!                "rating_deviation": 350.0, "volatility": 0.06}],
//!   "prices":  [{"symbol": "BTCUSDT", "timestamp": 0, "close": 42000.0, "volume": 1.0}]
//! }
//! ```
//!
//! `prices` may be omitted.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::in_memory::InMemoryMarketData;
use crate::application::ports::{MarketDataError, MarketDataPort};
use crate::domain::{PriceRecord, RatingRecord, TimeWindow};

#[derive(Debug, Deserialize)]
struct MarketDataFile {
    #[serde(default)]
    ratings: Vec<RatingRecord>,
    #[serde(default)]
    prices: Vec<PriceRecord>,
}

/// `MarketDataPort` backed by a JSON file read once at startup.
#[derive(Debug)]
pub struct JsonFileMarketData {
    inner: InMemoryMarketData,
}

impl JsonFileMarketData {
    /// Read and index `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MarketDataError> {
        let path = path.as_ref();
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| MarketDataError::ConnectionError {
                    message: format!("{}: {e}", path.display()),
                })?;
        Self::from_json(&contents)
    }

    /// Index market data from a JSON string.
    pub fn from_json(contents: &str) -> Result<Self, MarketDataError> {
        let file: MarketDataFile =
            serde_json::from_str(contents).map_err(|e| MarketDataError::ParseError {
                message: e.to_string(),
            })?;

        let inner = InMemoryMarketData::new();
        let (ratings, prices) = (file.ratings.len(), file.prices.len());
        inner.extend(file.ratings, file.prices);
        tracing::info!(ratings, prices, symbols = inner.symbols().len(), "Loaded market data");
        Ok(Self { inner })
    }

    /// Symbols with rating history.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.inner.symbols()
    }
}

#[async_trait]
impl MarketDataPort for JsonFileMarketData {
    async fn get_ratings(
        &self,
        symbol: &str,
        window: TimeWindow,
    ) -> Result<Vec<RatingRecord>, MarketDataError> {
        self.inner.get_ratings(symbol, window).await
    }

    async fn get_prices(
        &self,
        symbol: &str,
        window: TimeWindow,
    ) -> Result<Vec<PriceRecord>, MarketDataError> {
        self.inner.get_prices(symbol, window).await
    }
}
