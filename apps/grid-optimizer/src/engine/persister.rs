//! Fire-and-forget result persistence.
//!
//! The scheduler hands successful results to a bounded queue with
//! `try_send`; a background task drains it into the result sink. A full
//! queue drops the record, so a slow sink never delays dispatch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::application::ports::ResultSinkPort;
use crate::domain::{ParameterCombination, PerformanceMetrics};
use crate::observability::metrics as telemetry;

/// Totals reported when the persister has drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    /// Records accepted by the sink.
    pub persisted: u64,
    /// Records the sink rejected.
    pub failed: u64,
    /// Records dropped because the queue was full.
    pub dropped: u64,
}

impl PersistSummary {
    /// Combine two summaries.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            persisted: self.persisted + other.persisted,
            failed: self.failed + other.failed,
            dropped: self.dropped + other.dropped,
        }
    }
}

struct PersistJob {
    combination: ParameterCombination,
    metrics: PerformanceMetrics,
}

/// Handle to the background persistence task of one run.
pub struct ResultPersister {
    tx: mpsc::Sender<PersistJob>,
    dropped: Arc<AtomicU64>,
    handle: JoinHandle<PersistSummary>,
}

impl std::fmt::Debug for ResultPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultPersister")
            .field("capacity", &self.tx.max_capacity())
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ResultPersister {
    /// Start draining into `sink` for `run_id`.
    pub fn spawn(run_id: String, sink: Arc<dyn ResultSinkPort>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<PersistJob>(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let dropped_total = Arc::clone(&dropped);

        let handle = tokio::spawn(async move {
            let mut summary = PersistSummary::default();
            while let Some(job) = rx.recv().await {
                match sink.persist(&run_id, &job.combination, &job.metrics).await {
                    Ok(()) => summary.persisted += 1,
                    Err(e) => {
                        summary.failed += 1;
                        tracing::warn!(
                            run_id = %run_id,
                            params = %job.combination.label(),
                            error = %e,
                            "Failed to persist result"
                        );
                    }
                }
            }
            summary.dropped = dropped_total.load(Ordering::Relaxed);
            tracing::debug!(
                run_id = %run_id,
                persisted = summary.persisted,
                failed = summary.failed,
                dropped = summary.dropped,
                "Result persister drained"
            );
            summary
        });

        Self {
            tx,
            dropped,
            handle,
        }
    }

    /// Queue a result. Returns `false` if it was dropped.
    pub fn submit(&self, combination: &ParameterCombination, metrics: &PerformanceMetrics) -> bool {
        let job = PersistJob {
            combination: combination.clone(),
            metrics: metrics.clone(),
        };
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                telemetry::record_persist_dropped();
                tracing::warn!(
                    params = %job.combination.label(),
                    "Persistence queue full, dropping result"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Stop accepting results. The returned handle resolves once the queue
    /// has drained.
    pub fn close(self) -> JoinHandle<PersistSummary> {
        drop(self.tx);
        self.handle
    }
}
