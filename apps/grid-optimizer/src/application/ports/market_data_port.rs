//! Market Data Port (Driven Port)
//!
//! Interface for fetching rating and price history. Only the cache layer
//! calls it, on a miss.

use async_trait::async_trait;

use crate::domain::{PriceRecord, RatingRecord, TimeWindow};

/// Market data error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MarketDataError {
    /// Connection error.
    #[error("Market data connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Symbol not found.
    #[error("Symbol not found: {symbol}")]
    SymbolNotFound {
        /// The unknown symbol.
        symbol: String,
    },

    /// Data unavailable.
    #[error("Market data unavailable: {message}")]
    DataUnavailable {
        /// Error details.
        message: String,
    },

    /// Stored data could not be decoded.
    #[error("Market data parse error: {message}")]
    ParseError {
        /// Error details.
        message: String,
    },
}

/// Port for reading market data.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Ratings for `symbol` inside `window`, ordered by timestamp.
    async fn get_ratings(
        &self,
        symbol: &str,
        window: TimeWindow,
    ) -> Result<Vec<RatingRecord>, MarketDataError>;

    /// Prices for `symbol` inside `window`, ordered by timestamp.
    async fn get_prices(
        &self,
        symbol: &str,
        window: TimeWindow,
    ) -> Result<Vec<PriceRecord>, MarketDataError>;
}
