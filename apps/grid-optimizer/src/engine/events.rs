//! Engine lifecycle events.
//!
//! Broadcast to any number of observers. Observers that fall behind lose
//! events; the engine never waits for them.

use serde::Serialize;

use super::stats::EngineStats;
use crate::domain::{RunOutcome, TaskError, TaskId};

/// Event emitted by the scheduler.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Run started.
    Started {
        /// Run identifier.
        run_id: String,
        /// Tasks enumerated.
        total_tasks: u64,
        /// Execution units started.
        pool_size: usize,
    },
    /// Task handed to a unit.
    TaskStarted {
        /// Task identifier.
        task_id: TaskId,
        /// Receiving unit.
        unit_id: usize,
        /// Attempt number, starting at 1.
        attempt: u32,
    },
    /// Task produced metrics.
    TaskCompleted {
        /// Task identifier.
        task_id: TaskId,
        /// Unit that ran it.
        unit_id: usize,
        /// Execution time of the attempt.
        execution_time_ms: u64,
    },
    /// Attempt failed.
    TaskFailed {
        /// Task identifier.
        task_id: TaskId,
        /// Failure.
        error: TaskError,
        /// Attempt number that failed.
        attempt: u32,
        /// Whether the task went back to the queue.
        will_retry: bool,
    },
    /// Attempt exceeded its deadline.
    TaskTimeout {
        /// Task identifier.
        task_id: TaskId,
        /// Unit that ran it.
        unit_id: usize,
        /// Attempt number that timed out.
        attempt: u32,
        /// Whether the task went back to the queue.
        will_retry: bool,
    },
    /// Execution unit died.
    UnitCrashed {
        /// Unit identifier.
        unit_id: usize,
        /// Task it was running.
        task_id: Option<TaskId>,
        /// Whether a replacement was started.
        respawned: bool,
    },
    /// Periodic statistics.
    Progress(EngineStats),
    /// Run finished.
    Completed {
        /// Run identifier.
        run_id: String,
        /// Why the run stopped.
        outcome: RunOutcome,
        /// Completed tasks.
        completed: u64,
        /// Permanently failed tasks.
        failed: u64,
        /// Wall-clock run time.
        total_time_ms: u64,
    },
}

impl EngineEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskFailed { .. } => "task_failed",
            Self::TaskTimeout { .. } => "task_timeout",
            Self::UnitCrashed { .. } => "unit_crashed",
            Self::Progress(_) => "progress",
            Self::Completed { .. } => "completed",
        }
    }
}
