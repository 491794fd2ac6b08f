//! Execution unit.
//!
//! A unit receives one [`Assignment`] at a time over its own channel, resolves
//! the input series through the cache, runs the backtest under the task's
//! deadline and sends a [`UnitReport`] back. It never retries.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::Instrument;

use crate::application::ports::{BacktestInputs, BacktestPort, ComputeError, MarketDataError, MarketDataPort};
use crate::cache::{CacheTier, TierSelection, TieredCache, keys};
use crate::domain::{
    ParameterCombination, PerformanceMetrics, PriceRecord, RatingRecord, TaskError, TaskErrorKind,
    TaskId, ZScorePoint,
};
use crate::strategy::rolling_z_scores;

/// Work handed to a unit.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// Task identifier.
    pub task_id: TaskId,
    /// Parameters to evaluate.
    pub combination: ParameterCombination,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// Instant after which the attempt counts as timed out.
    pub deadline: tokio::time::Instant,
}

/// Result of one attempt.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// Unit that ran the attempt.
    pub unit_id: usize,
    /// Task identifier.
    pub task_id: TaskId,
    /// Metrics or the classified failure.
    pub result: Result<PerformanceMetrics, TaskError>,
    /// Wall-clock time of the attempt.
    pub execution_time_ms: u64,
    /// Change in the cache's estimated footprint during the attempt.
    pub memory_delta_bytes: i64,
}

/// Message from the pool to the scheduler.
#[derive(Debug, Clone)]
pub enum UnitReport {
    /// An attempt finished (successfully or not).
    Finished(AttemptOutcome),
    /// A unit died while running a task.
    Crashed {
        /// Unit identifier.
        unit_id: usize,
        /// Panic message.
        message: String,
    },
}

/// Collaborators shared by every unit.
#[derive(Clone)]
pub struct UnitContext {
    /// Shared cache for input series.
    pub cache: Arc<TieredCache>,
    /// Source consulted on cache misses.
    pub market_data: Arc<dyn MarketDataPort>,
    /// Backtest to run.
    pub backtest: Arc<dyn BacktestPort>,
}

impl std::fmt::Debug for UnitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitContext")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// One execution unit.
#[derive(Debug)]
pub struct ExecutionUnit {
    id: usize,
    context: UnitContext,
    reports: mpsc::Sender<UnitReport>,
}

impl ExecutionUnit {
    /// Create a unit that reports to `reports`.
    #[must_use]
    pub const fn new(id: usize, context: UnitContext, reports: mpsc::Sender<UnitReport>) -> Self {
        Self {
            id,
            context,
            reports,
        }
    }

    /// Unit identifier.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Process assignments until the channel closes or nobody listens for
    /// reports any more.
    pub async fn run(self, mut assignments: mpsc::Receiver<Assignment>) {
        tracing::debug!(unit_id = self.id, "Execution unit started");
        while let Some(assignment) = assignments.recv().await {
            let outcome = self.execute(assignment).await;
            if self.reports.send(UnitReport::Finished(outcome)).await.is_err() {
                break;
            }
        }
        tracing::debug!(unit_id = self.id, "Execution unit stopped");
    }

    /// Run one attempt under its deadline.
    pub async fn execute(&self, assignment: Assignment) -> AttemptOutcome {
        let span = tracing::info_span!(
            "task.execute",
            task_id = %assignment.task_id,
            unit_id = self.id,
            attempt = assignment.attempt,
        );

        async {
            let started = Instant::now();
            let memory_before = self.context.cache.memory_usage_bytes();

            let result = match tokio::time::timeout_at(
                assignment.deadline,
                self.attempt(&assignment.combination),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(TaskError::new(
                    TaskErrorKind::Timeout,
                    format!("deadline exceeded after {}ms", started.elapsed().as_millis()),
                )),
            };

            let execution_time_ms = started.elapsed().as_millis() as u64;
            let memory_after = self.context.cache.memory_usage_bytes();
            match &result {
                Ok(metrics) => tracing::debug!(
                    execution_time_ms,
                    sharpe = metrics.sharpe_ratio,
                    trades = metrics.total_trades,
                    "Attempt completed"
                ),
                Err(error) => tracing::debug!(execution_time_ms, error = %error, "Attempt failed"),
            }

            AttemptOutcome {
                unit_id: self.id,
                task_id: assignment.task_id,
                result,
                execution_time_ms,
                memory_delta_bytes: memory_after as i64 - memory_before as i64,
            }
        }
        .instrument(span)
        .await
    }

    async fn attempt(&self, combination: &ParameterCombination) -> Result<PerformanceMetrics, TaskError> {
        let inputs = self.resolve_inputs(combination).await.map_err(|e| {
            TaskError::new(TaskErrorKind::DataUnavailable, e.to_string())
        })?;

        self.context
            .backtest
            .compute(combination, &inputs)
            .await
            .map_err(|e| match e {
                ComputeError::Failed { message } => {
                    TaskError::new(TaskErrorKind::TransientCompute, message)
                }
                ComputeError::InvalidParameters { message } => {
                    TaskError::new(TaskErrorKind::InvalidParameters, message)
                }
            })
    }

    /// Ratings, prices and the z-score series for `combination`, each
    /// through the cache.
    async fn resolve_inputs(
        &self,
        combination: &ParameterCombination,
    ) -> Result<BacktestInputs, MarketDataError> {
        let cache = &self.context.cache;
        let market_data = &self.context.market_data;
        let symbol = combination.context.symbol();
        let window = combination.context.window;

        let ratings: Vec<RatingRecord> = cache
            .get_or_load(&keys::ratings_key(&symbol, window), TierSelection::Auto, || {
                market_data.get_ratings(&symbol, window)
            })
            .await?;
        if ratings.is_empty() {
            return Err(MarketDataError::DataUnavailable {
                message: format!("no ratings for {symbol} in [{}, {}]", window.start, window.end),
            });
        }
        let ratings = Arc::new(ratings);

        let prices: Vec<PriceRecord> = cache
            .get_or_load(&keys::prices_key(&symbol, window), TierSelection::Auto, || {
                market_data.get_prices(&symbol, window)
            })
            .await?;

        let moving_average = combination.moving_average;
        let z_scores: Vec<ZScorePoint> = cache
            .get_or_load(
                &keys::zscore_key(&symbol, window, moving_average),
                TierSelection::Tier(CacheTier::Compute),
                || {
                    let ratings = Arc::clone(&ratings);
                    async move {
                        tokio::task::spawn_blocking(move || rolling_z_scores(&ratings, moving_average))
                            .await
                            .map_err(|e| MarketDataError::DataUnavailable {
                                message: format!("z-score computation failed: {e}"),
                            })
                    }
                },
            )
            .await?;

        Ok(BacktestInputs {
            ratings,
            prices: Arc::new(prices),
            z_scores: Arc::new(z_scores),
        })
    }
}
