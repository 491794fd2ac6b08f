//! Result Sink Port (Driven Port)
//!
//! Best-effort destination for completed backtest results. Failures are
//! logged by the caller and never reach the scheduling loop.

use async_trait::async_trait;

use crate::domain::{ParameterCombination, PerformanceMetrics};

/// Result sink error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    /// Connection or I/O error.
    #[error("Result sink I/O error: {message}")]
    Io {
        /// Error details.
        message: String,
    },

    /// Serialization error.
    #[error("Result serialization error: {message}")]
    Serialization {
        /// Error details.
        message: String,
    },
}

/// Port for persisting results.
#[async_trait]
pub trait ResultSinkPort: Send + Sync {
    /// Persist one result.
    async fn persist(
        &self,
        run_id: &str,
        combination: &ParameterCombination,
        metrics: &PerformanceMetrics,
    ) -> Result<(), SinkError>;
}

/// Sink that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoOpResultSink;

#[async_trait]
impl ResultSinkPort for NoOpResultSink {
    async fn persist(
        &self,
        _run_id: &str,
        _combination: &ParameterCombination,
        _metrics: &PerformanceMetrics,
    ) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SharedContext, TimeWindow};

    #[tokio::test]
    async fn no_op_sink_succeeds() {
        let sink = NoOpResultSink;
        let combination = ParameterCombination {
            threshold: 1.0,
            profit_percent: 5.0,
            stop_loss_percent: 2.0,
            moving_average: 20,
            context: SharedContext {
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                window: TimeWindow::new(0, 1),
            },
        };
        let result = sink
            .persist("run", &combination, &PerformanceMetrics::default())
            .await;
        assert!(result.is_ok());
    }
}
