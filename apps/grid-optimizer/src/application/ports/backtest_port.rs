//! Backtest Port (Driven Port)
//!
//! The backtest simulation is an opaque, potentially slow, potentially failing
//! function from parameters and input series to performance metrics.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ParameterCombination, PerformanceMetrics, PriceRecord, RatingRecord, ZScorePoint};

/// Input series resolved through the cache before a backtest runs.
#[derive(Debug, Clone, Default)]
pub struct BacktestInputs {
    /// Rating history for the run symbol, ordered by timestamp.
    pub ratings: Arc<Vec<RatingRecord>>,
    /// Price history for the run symbol, ordered by timestamp.
    pub prices: Arc<Vec<PriceRecord>>,
    /// Rolling z-score of the ratings for the combination's moving average.
    pub z_scores: Arc<Vec<ZScorePoint>>,
}

/// Backtest computation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    /// Computation failed; another attempt may succeed.
    #[error("Backtest failed: {message}")]
    Failed {
        /// Error details.
        message: String,
    },

    /// Parameters can never produce a result.
    #[error("Invalid backtest parameters: {message}")]
    InvalidParameters {
        /// Error details.
        message: String,
    },
}

impl ComputeError {
    /// Create a retryable failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Port for running one backtest.
#[async_trait]
pub trait BacktestPort: Send + Sync {
    /// Run the backtest for one combination.
    async fn compute(
        &self,
        combination: &ParameterCombination,
        inputs: &BacktestInputs,
    ) -> Result<PerformanceMetrics, ComputeError>;
}
