//! Result types for task execution and optimization runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::parameters::ParameterCombination;
use super::performance::PerformanceMetrics;
use super::task::TaskId;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskErrorKind {
    /// Backtest function returned a transient error.
    TransientCompute,
    /// Backtest rejected the parameters; never retried.
    InvalidParameters,
    /// Per-task deadline exceeded.
    Timeout,
    /// Execution unit died mid-task.
    UnitCrash,
    /// Input series could not be fetched.
    DataUnavailable,
}

impl TaskErrorKind {
    /// Whether another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidParameters)
    }

    /// Stable name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TransientCompute => "TRANSIENT_COMPUTE",
            Self::InvalidParameters => "INVALID_PARAMETERS",
            Self::Timeout => "TIMEOUT",
            Self::UnitCrash => "UNIT_CRASH",
            Self::DataUnavailable => "DATA_UNAVAILABLE",
        }
    }
}

impl fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to a failed attempt or a failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// Error classification.
    pub kind: TaskErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl TaskError {
    /// Create a new task error.
    #[must_use]
    pub fn new(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Terminal status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Backtest produced metrics.
    Completed,
    /// Permanent failure.
    Failed,
}

/// Outcome of one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Task identifier.
    pub task_id: TaskId,
    /// Parameters evaluated.
    pub combination: ParameterCombination,
    /// Terminal status.
    pub status: TaskStatus,
    /// Metrics when completed.
    pub metrics: Option<PerformanceMetrics>,
    /// Last error when failed.
    pub error: Option<TaskError>,
    /// Attempts made, including the final one.
    pub attempts: u32,
    /// Execution time of the final attempt in milliseconds.
    pub execution_time_ms: u64,
    /// Change in estimated cache footprint during the final attempt.
    pub memory_delta_bytes: i64,
    /// Unit that ran the final attempt.
    pub unit_id: Option<usize>,
}

impl TaskResult {
    /// Whether the task completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Sharpe ratio when available.
    #[must_use]
    pub fn sharpe(&self) -> Option<f64> {
        self.metrics.as_ref().map(|m| m.sharpe_ratio)
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    /// Every task reached a terminal state.
    Completed,
    /// Global deadline fired first.
    DeadlineExceeded,
    /// Every execution unit was retired.
    PoolExhausted,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::DeadlineExceeded => write!(f, "DEADLINE_EXCEEDED"),
            Self::PoolExhausted => write!(f, "POOL_EXHAUSTED"),
        }
    }
}

/// Result of a scheduler run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRun {
    /// Run identifier.
    pub run_id: String,
    /// Why the run stopped.
    pub outcome: RunOutcome,
    /// Terminal task results, sorted by task id.
    pub results: Vec<TaskResult>,
    /// Combinations that never reached a terminal state.
    pub unfinished: Vec<ParameterCombination>,
    /// Total tasks enumerated.
    pub total_tasks: u64,
    /// Wall-clock run time in milliseconds.
    pub total_time_ms: u64,
    /// Units the pool started with.
    pub pool_size: usize,
    /// Units replaced after crashes.
    pub units_respawned: u64,
}

impl OptimizationRun {
    /// Number of completed tasks.
    #[must_use]
    pub fn succeeded(&self) -> u64 {
        self.results.iter().filter(|r| r.is_success()).count() as u64
    }

    /// Number of permanently failed tasks.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.results.iter().filter(|r| !r.is_success()).count() as u64
    }

    /// Completed / (completed + failed).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let terminal = self.results.len();
        if terminal == 0 {
            0.0
        } else {
            self.succeeded() as f64 / terminal as f64
        }
    }

    /// Get successful results only.
    #[must_use]
    pub fn successful_results(&self) -> Vec<&TaskResult> {
        self.results.iter().filter(|r| r.is_success()).collect()
    }

    /// Get failed results only.
    #[must_use]
    pub fn failed_results(&self) -> Vec<&TaskResult> {
        self.results.iter().filter(|r| !r.is_success()).collect()
    }

    /// Get the best result by Sharpe ratio.
    #[must_use]
    pub fn best_by_sharpe(&self) -> Option<&TaskResult> {
        self.ranked_by_sharpe().into_iter().next()
    }

    /// Successful results, best Sharpe first.
    #[must_use]
    pub fn ranked_by_sharpe(&self) -> Vec<&TaskResult> {
        let mut ranked: Vec<&TaskResult> = self
            .results
            .iter()
            .filter(|r| r.is_success() && r.metrics.is_some())
            .collect();
        ranked.sort_by(|a, b| match (&a.metrics, &b.metrics) {
            (Some(ma), Some(mb)) => mb.cmp_sharpe(ma),
            _ => std::cmp::Ordering::Equal,
        });
        ranked
    }

    /// Sum of per-task execution time divided by `elapsed × units`.
    ///
    /// 1.0 means every unit was busy for the whole run.
    #[must_use]
    pub fn parallel_efficiency(&self) -> f64 {
        if self.total_time_ms == 0 || self.pool_size == 0 {
            return 0.0;
        }
        let busy: u64 = self.results.iter().map(|r| r.execution_time_ms).sum();
        busy as f64 / (self.total_time_ms as f64 * self.pool_size as f64)
    }
}
