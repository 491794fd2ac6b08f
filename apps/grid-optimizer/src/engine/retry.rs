//! Retry decisions for failed attempts.
//!
//! The scheduler owns every retry; execution units never retry on their own.
//!
//! | Error kind | Retryable |
//! |------------|-----------|
//! | `TRANSIENT_COMPUTE` | yes |
//! | `TIMEOUT` | yes |
//! | `DATA_UNAVAILABLE` | yes |
//! | `INVALID_PARAMETERS` | no |
//!
//! A retryable failure consumes one retry and requeues the task after an
//! optional exponential backoff with jitter. With `initial_backoff_ms = 0`
//! the task is requeued immediately.
//!
//! Unit crashes never reach this policy: the scheduler requeues the orphaned
//! task directly and leaves its retry count untouched.

use std::time::Duration;

use rand::Rng;

use crate::config::{RetryBackoffConfig, SchedulerConfig};
use crate::domain::{Task, TaskError, TaskState};

/// What to do with a task after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the task back in its band after `delay`.
    Requeue {
        /// Backoff before the task is queued again.
        delay: Duration,
    },
    /// Record the task as permanently failed.
    Fail,
}

/// Bounded retry budget plus requeue backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    multiplier: f64,
    jitter_factor: f64,
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_retries: u32, backoff: RetryBackoffConfig) -> Self {
        Self {
            max_retries,
            initial_backoff_ms: backoff.initial_backoff_ms,
            max_backoff_ms: backoff.max_backoff_ms,
            multiplier: backoff.multiplier,
            jitter_factor: backoff.jitter_factor,
        }
    }

    /// Build from scheduler settings.
    #[must_use]
    pub const fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff)
    }

    /// Retries allowed after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide the fate of `task` after `error`, updating its state and
    /// retry count.
    pub fn decide(&self, task: &mut Task, error: &TaskError) -> RetryDecision {
        if !error.kind.is_retryable() {
            task.state = TaskState::Failed;
            return RetryDecision::Fail;
        }
        if task.try_requeue(self.max_retries) {
            RetryDecision::Requeue {
                delay: self.backoff(task.retry_count),
            }
        } else {
            RetryDecision::Fail
        }
    }

    /// Delay before the `retry`-th requeue (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        if self.initial_backoff_ms == 0 || retry == 0 {
            return Duration::ZERO;
        }
        let base_ms = self.base_backoff_ms(retry - 1);
        let jittered_ms = self.apply_jitter(base_ms);
        Duration::from_millis(jittered_ms.min(self.max_backoff_ms))
    }

    fn base_backoff_ms(&self, exponent: u32) -> u64 {
        let factor = self.multiplier.powi(exponent.min(i32::MAX as u32) as i32);
        let backoff = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        backoff as u64
    }

    /// Random value in `[backoff * (1 - jitter), backoff * (1 + jitter)]`.
    fn apply_jitter(&self, backoff_ms: u64) -> u64 {
        if self.jitter_factor <= 0.0 || backoff_ms == 0 {
            return backoff_ms;
        }
        let spread = backoff_ms as f64 * self.jitter_factor;
        let low = (backoff_ms as f64 - spread).max(0.0);
        let high = backoff_ms as f64 + spread;
        rand::rng().random_range(low..=high) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParameterCombination, SharedContext, TaskErrorKind, TaskId, TaskPriority, TimeWindow};
    use test_case::test_case;

    fn task() -> Task {
        let combination = ParameterCombination {
            threshold: 2.0,
            profit_percent: 5.0,
            stop_loss_percent: 2.0,
            moving_average: 20,
            context: SharedContext {
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                window: TimeWindow::new(0, 1),
            },
        };
        Task::new(TaskId(0), combination, TaskPriority::Normal)
    }

    fn no_jitter(initial_backoff_ms: u64) -> RetryBackoffConfig {
        RetryBackoffConfig {
            initial_backoff_ms,
            max_backoff_ms: 1_000,
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test_case(TaskErrorKind::TransientCompute, true ; "transient compute")]
    #[test_case(TaskErrorKind::Timeout, true ; "timeout")]
    #[test_case(TaskErrorKind::DataUnavailable, true ; "data unavailable")]
    #[test_case(TaskErrorKind::InvalidParameters, false ; "invalid parameters")]
    fn test_first_failure(kind: TaskErrorKind, requeued: bool) {
        let policy = RetryPolicy::new(3, no_jitter(0));
        let mut task = task();
        let decision = policy.decide(&mut task, &TaskError::new(kind, "boom"));

        assert_eq!(matches!(decision, RetryDecision::Requeue { .. }), requeued);
        assert_eq!(task.retry_count, u32::from(requeued));
    }

    #[test]
    fn test_budget_exhausted_after_max_retries() {
        let policy = RetryPolicy::new(2, no_jitter(0));
        let mut task = task();
        let error = TaskError::new(TaskErrorKind::TransientCompute, "boom");

        assert_eq!(
            policy.decide(&mut task, &error),
            RetryDecision::Requeue {
                delay: Duration::ZERO
            }
        );
        assert!(matches!(policy.decide(&mut task, &error), RetryDecision::Requeue { .. }));
        assert_eq!(policy.decide(&mut task, &error), RetryDecision::Fail);
        assert_eq!(task.retry_count, 2);
        assert_eq!(task.attempts(), 3);
        assert_eq!(task.state, TaskState::Failed);
    }

    #[test]
    fn test_exponential_backoff_sequence() {
        let policy = RetryPolicy::new(10, no_jitter(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(30), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_range() {
        let policy = RetryPolicy::new(
            3,
            RetryBackoffConfig {
                initial_backoff_ms: 100,
                max_backoff_ms: 5_000,
                multiplier: 2.0,
                jitter_factor: 0.2,
            },
        );
        for _ in 0..100 {
            let delay = policy.backoff(1);
            assert!(
                delay >= Duration::from_millis(80) && delay <= Duration::from_millis(120),
                "delay {delay:?} outside 80-120ms"
            );
        }
    }
}
