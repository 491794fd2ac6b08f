//! Grid optimizer facade.
//!
//! Enumerates a parameter grid, warms the cache for the grid's symbol,
//! runs the scheduler and ranks what came back.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::error::EngineError;
use super::persister::PersistSummary;
use super::scheduler::Scheduler;
use crate::cache::{CacheMetrics, CacheWarmer, WarmReport};
use crate::domain::{
    OptimizationRun, ParameterCombination, ParameterGrid, RunOutcome, TaskError, TaskResult,
};

/// A permanently failed combination.
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    /// Parameters that failed.
    pub combination: ParameterCombination,
    /// Final error.
    pub error: Option<TaskError>,
    /// Attempts made.
    pub attempts: u32,
}

/// Human-facing summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: String,
    /// Why the run stopped.
    pub outcome: RunOutcome,
    /// Tasks enumerated.
    pub total_tasks: u64,
    /// Tasks that produced metrics.
    pub succeeded: u64,
    /// Tasks that failed permanently.
    pub failed: u64,
    /// Tasks that never reached a terminal state.
    pub unfinished: u64,
    /// succeeded / (succeeded + failed).
    pub success_rate: f64,
    /// Wall-clock run time.
    pub total_time_ms: u64,
    /// Mean execution time per terminal task.
    pub avg_task_ms: f64,
    /// Fastest terminal task.
    pub min_task_ms: u64,
    /// Slowest terminal task.
    pub max_task_ms: u64,
    /// Σ task time / (elapsed × units).
    pub parallel_efficiency: f64,
    /// Units replaced after crashes.
    pub units_respawned: u64,
    /// Failed combinations with their errors.
    pub failures: Vec<FailureSummary>,
}

impl RunSummary {
    /// Summarize a finished run.
    #[must_use]
    pub fn from_run(run: &OptimizationRun) -> Self {
        let times: Vec<u64> = run.results.iter().map(|r| r.execution_time_ms).collect();
        let avg_task_ms = if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<u64>() as f64 / times.len() as f64
        };

        Self {
            run_id: run.run_id.clone(),
            outcome: run.outcome,
            total_tasks: run.total_tasks,
            succeeded: run.succeeded(),
            failed: run.failed(),
            unfinished: run.unfinished.len() as u64,
            success_rate: run.success_rate(),
            total_time_ms: run.total_time_ms,
            avg_task_ms,
            min_task_ms: times.iter().copied().min().unwrap_or(0),
            max_task_ms: times.iter().copied().max().unwrap_or(0),
            parallel_efficiency: run.parallel_efficiency(),
            units_respawned: run.units_respawned,
            failures: run
                .failed_results()
                .into_iter()
                .map(|r| FailureSummary {
                    combination: r.combination.clone(),
                    error: r.error.clone(),
                    attempts: r.attempts,
                })
                .collect(),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} finished: {}", self.run_id, self.outcome)?;
        writeln!(
            f,
            "  tasks: {} total, {} succeeded, {} failed, {} unfinished ({:.1}% success)",
            self.total_tasks,
            self.succeeded,
            self.failed,
            self.unfinished,
            self.success_rate * 100.0
        )?;
        writeln!(
            f,
            "  timing: {}ms total, task avg {:.1}ms (min {}ms, max {}ms), efficiency {:.2}",
            self.total_time_ms,
            self.avg_task_ms,
            self.min_task_ms,
            self.max_task_ms,
            self.parallel_efficiency
        )?;
        if self.units_respawned > 0 {
            writeln!(f, "  units respawned: {}", self.units_respawned)?;
        }
        for failure in &self.failures {
            let error = failure
                .error
                .as_ref()
                .map_or_else(|| "unknown".to_string(), ToString::to_string);
            writeln!(
                f,
                "  FAILED {} after {} attempts: {error}",
                failure.combination.label(),
                failure.attempts
            )?;
        }
        Ok(())
    }
}

/// Everything a caller gets back from [`GridOptimizer::run`].
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    /// Raw run result.
    pub run: OptimizationRun,
    /// Summary.
    pub summary: RunSummary,
    /// Best results by Sharpe ratio.
    pub top: Vec<TaskResult>,
    /// Warm pass that preceded the run.
    pub warm: Option<WarmReport>,
    /// Cache statistics after the run.
    pub cache: CacheMetrics,
}

impl OptimizationReport {
    /// Best result, if any task succeeded.
    #[must_use]
    pub fn best(&self) -> Option<&TaskResult> {
        self.top.first()
    }
}

/// Grid search entry point.
#[derive(Debug)]
pub struct GridOptimizer {
    scheduler: Scheduler,
    warmer: Arc<CacheWarmer>,
    top_n: usize,
}

impl GridOptimizer {
    /// Create an optimizer keeping the `top_n` best results.
    #[must_use]
    pub const fn new(scheduler: Scheduler, warmer: Arc<CacheWarmer>, top_n: usize) -> Self {
        Self {
            scheduler,
            warmer,
            top_n,
        }
    }

    /// Underlying scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Cache warmer.
    #[must_use]
    pub const fn warmer(&self) -> &Arc<CacheWarmer> {
        &self.warmer
    }

    /// Search `grid`.
    ///
    /// Fails before any task runs when the grid is empty or, with warming
    /// enabled, when no market data could be loaded for the grid's symbol.
    pub async fn run(&self, grid: &ParameterGrid) -> Result<OptimizationReport, EngineError> {
        let combinations = grid.combinations();
        if combinations.is_empty() {
            return Err(EngineError::EmptyGrid);
        }

        let context = grid.context();
        let symbol = context.symbol();
        tracing::info!(
            symbol = %symbol,
            combinations = combinations.len(),
            moving_averages = ?grid.moving_averages(),
            "Starting grid search"
        );

        let warm = if self.warmer.is_enabled() {
            let report = self
                .warmer
                .warm(&[symbol.clone()], context.window, grid.moving_averages())
                .await;
            if report.is_empty() {
                let message = report
                    .failures
                    .iter()
                    .map(|f| format!("{}: {}", f.symbol, f.error))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(EngineError::NoMarketData { message });
            }
            Some(report)
        } else {
            None
        };

        let run = self.scheduler.run_optimization(combinations).await?;
        let summary = RunSummary::from_run(&run);
        let top = run
            .ranked_by_sharpe()
            .into_iter()
            .take(self.top_n)
            .cloned()
            .collect();

        Ok(OptimizationReport {
            cache: self.warmer.cache().metrics(),
            summary,
            top,
            warm,
            run,
        })
    }

    /// Wait for queued results to reach the sink.
    pub async fn flush_results(&self) -> PersistSummary {
        self.scheduler.flush_results().await
    }
}
