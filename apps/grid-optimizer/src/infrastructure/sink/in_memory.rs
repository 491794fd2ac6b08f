//! In-memory result sink.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::PersistedResult;
use crate::application::ports::{ResultSinkPort, SinkError};
use crate::domain::{ParameterCombination, PerformanceMetrics};

/// In-memory implementation of `ResultSinkPort`.
///
/// Optional latency and failure injection let tests check that a slow or
/// broken sink never holds up scheduling.
#[derive(Debug, Default)]
pub struct InMemoryResultSink {
    records: RwLock<Vec<PersistedResult>>,
    latency: Duration,
    fail: bool,
}

impl InMemoryResultSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every write by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reject every write.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of persisted records.
    #[must_use]
    pub fn records(&self) -> Vec<PersistedResult> {
        self.records.read().clone()
    }

    /// Number of persisted records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if nothing was persisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Drop all records.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[async_trait]
impl ResultSinkPort for InMemoryResultSink {
    async fn persist(
        &self,
        run_id: &str,
        combination: &ParameterCombination,
        metrics: &PerformanceMetrics,
    ) -> Result<(), SinkError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail {
            return Err(SinkError::Io {
                message: "sink unavailable".to_string(),
            });
        }
        self.records
            .write()
            .push(PersistedResult::new(run_id, combination, metrics));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SharedContext, TimeWindow};

    fn combination() -> ParameterCombination {
        ParameterCombination {
            threshold: 1.5,
            profit_percent: 4.0,
            stop_loss_percent: 2.0,
            moving_average: 20,
            context: SharedContext {
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                window: TimeWindow::new(0, 1_000),
            },
        }
    }

    #[tokio::test]
    async fn test_persist_records() {
        let sink = InMemoryResultSink::new();
        assert!(sink.is_empty());

        let result = sink
            .persist("run-1", &combination(), &PerformanceMetrics::default())
            .await;
        assert!(result.is_ok());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].run_id, "run-1");

        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_failing_sink() {
        let sink = InMemoryResultSink::failing();
        let result = sink
            .persist("run-1", &combination(), &PerformanceMetrics::default())
            .await;
        assert!(matches!(result, Err(SinkError::Io { .. })));
        assert!(sink.is_empty());
    }
}
