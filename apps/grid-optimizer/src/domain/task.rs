//! Scheduled units of work and their lifecycle.
//!
//! # State Machine
//!
//! ```text
//! QUEUED → ASSIGNED → COMPLETED
//!                   → REQUEUED → QUEUED
//!                   → FAILED
//! ```
//!
//! `COMPLETED` and `FAILED` are terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::parameters::ParameterCombination;

/// Task identifier (index of the combination in the run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Dispatch priority band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    /// Extreme parameter values.
    Low,
    /// Default band.
    Normal,
    /// Parameters inside the plausible range.
    High,
}

impl TaskPriority {
    /// All bands, highest first.
    pub const DISPATCH_ORDER: [Self; 3] = [Self::High, Self::Normal, Self::Low];
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Normal => write!(f, "NORMAL"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Waiting in the queue.
    Queued,
    /// Handed to an execution unit.
    Assigned,
    /// Failed attempt, waiting to re-enter the queue.
    Requeued,
    /// Finished successfully.
    Completed,
    /// Retries exhausted or non-retryable error.
    Failed,
}

impl TaskState {
    /// Whether the state is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A unit of scheduled work: one parameter combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// Combination to evaluate.
    pub combination: ParameterCombination,
    /// Dispatch priority.
    pub priority: TaskPriority,
    /// Retries consumed so far.
    pub retry_count: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Start time of the latest attempt.
    pub started_at: Option<DateTime<Utc>>,
    /// Lifecycle state.
    pub state: TaskState,
}

impl Task {
    /// Create a queued task.
    #[must_use]
    pub fn new(id: TaskId, combination: ParameterCombination, priority: TaskPriority) -> Self {
        Self {
            id,
            combination,
            priority,
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            state: TaskState::Queued,
        }
    }

    /// Number of attempts made so far (including a running one).
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.retry_count + 1
    }

    /// Mark the task as handed to a unit.
    pub fn mark_assigned(&mut self) {
        self.state = TaskState::Assigned;
        self.started_at = Some(Utc::now());
    }

    /// Consume one retry. Returns `false` when the budget is spent and the
    /// task was marked failed instead.
    pub fn try_requeue(&mut self, max_retries: u32) -> bool {
        if self.retry_count < max_retries {
            self.retry_count += 1;
            self.state = TaskState::Requeued;
            true
        } else {
            self.state = TaskState::Failed;
            false
        }
    }
}

/// Inclusive bounds for each parameter axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    /// Threshold range.
    pub threshold: (f64, f64),
    /// Take-profit range (percent).
    pub profit_percent: (f64, f64),
    /// Stop-loss range (percent).
    pub stop_loss_percent: (f64, f64),
}

impl ParameterBounds {
    fn contains(&self, combo: &ParameterCombination) -> bool {
        within(combo.threshold, self.threshold)
            && within(combo.profit_percent, self.profit_percent)
            && within(combo.stop_loss_percent, self.stop_loss_percent)
    }
}

fn within(value: f64, (low, high): (f64, f64)) -> bool {
    value >= low && value <= high
}

/// Assigns a priority band from parameter plausibility.
///
/// All values inside `plausible` → High; any value outside `extreme` → Low;
/// everything else → Normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityPolicy {
    /// Range considered most promising.
    pub plausible: ParameterBounds,
    /// Range beyond which values are considered extreme.
    pub extreme: ParameterBounds,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            plausible: ParameterBounds {
                threshold: (1.0, 3.0),
                profit_percent: (2.0, 10.0),
                stop_loss_percent: (1.0, 5.0),
            },
            extreme: ParameterBounds {
                threshold: (0.5, 4.0),
                profit_percent: (0.5, 20.0),
                stop_loss_percent: (0.5, 10.0),
            },
        }
    }
}

impl PriorityPolicy {
    /// Classify a combination.
    #[must_use]
    pub fn classify(&self, combo: &ParameterCombination) -> TaskPriority {
        if self.plausible.contains(combo) {
            TaskPriority::High
        } else if !self.extreme.contains(combo) {
            TaskPriority::Low
        } else {
            TaskPriority::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parameters::{SharedContext, TimeWindow};

    fn combo(threshold: f64, profit: f64, stop: f64) -> ParameterCombination {
        ParameterCombination {
            threshold,
            profit_percent: profit,
            stop_loss_percent: stop,
            moving_average: 20,
            context: SharedContext {
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                window: TimeWindow::new(0, 1),
            },
        }
    }

    #[test]
    fn test_priority_classification() {
        let policy = PriorityPolicy::default();
        assert_eq!(policy.classify(&combo(2.0, 5.0, 2.0)), TaskPriority::High);
        assert_eq!(policy.classify(&combo(3.5, 5.0, 2.0)), TaskPriority::Normal);
        assert_eq!(policy.classify(&combo(6.0, 5.0, 2.0)), TaskPriority::Low);
        assert_eq!(policy.classify(&combo(2.0, 50.0, 2.0)), TaskPriority::Low);
    }

    #[test]
    fn test_requeue_respects_budget() {
        let mut task = Task::new(TaskId(1), combo(2.0, 5.0, 2.0), TaskPriority::High);
        task.mark_assigned();
        assert!(task.try_requeue(2));
        assert!(task.try_requeue(2));
        assert_eq!(task.retry_count, 2);
        assert!(!task.try_requeue(2));
        assert_eq!(task.retry_count, 2);
        assert_eq!(task.state, TaskState::Failed);
        assert!(task.state.is_terminal());
        assert_eq!(task.attempts(), 3);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::High > TaskPriority::Normal);
        assert!(TaskPriority::Normal > TaskPriority::Low);
        assert_eq!(TaskPriority::DISPATCH_ORDER[0], TaskPriority::High);
    }
}
