//! Scheduler and worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::PriorityPolicy;

/// Backoff before a failed task is requeued.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryBackoffConfig {
    /// Delay before the first requeue in milliseconds (0 requeues at once).
    #[serde(default)]
    pub initial_backoff_ms: u64,
    /// Upper bound on the delay in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Growth factor per attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Random spread as a fraction of the delay (0.0 - 1.0).
    #[serde(default = "default_jitter")]
    pub jitter_factor: f64,
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 0,
            max_backoff_ms: default_max_backoff(),
            multiplier: default_multiplier(),
            jitter_factor: default_jitter(),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on the pool size.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Exact pool size, overriding the core count.
    #[serde(default)]
    pub fixed_workers: Option<usize>,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-task deadline in milliseconds.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_ms: u64,
    /// Whole-run deadline in milliseconds.
    #[serde(default)]
    pub run_timeout_ms: Option<u64>,
    /// Respawns allowed per execution unit.
    #[serde(default = "default_max_respawns")]
    pub max_respawns_per_unit: u32,
    /// Requeue backoff.
    #[serde(default)]
    pub retry_backoff: RetryBackoffConfig,
    /// Progress log interval in seconds (0 disables the log).
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
    /// Capacity of the result persistence queue.
    #[serde(default = "default_persist_capacity")]
    pub persist_queue_capacity: usize,
    /// Capacity of the engine event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Priority bands for combinations.
    #[serde(default)]
    pub priority: PriorityPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            fixed_workers: None,
            max_retries: default_max_retries(),
            task_timeout_ms: default_task_timeout(),
            run_timeout_ms: None,
            max_respawns_per_unit: default_max_respawns(),
            retry_backoff: RetryBackoffConfig::default(),
            progress_interval_secs: default_progress_interval(),
            persist_queue_capacity: default_persist_capacity(),
            event_capacity: default_event_capacity(),
            priority: PriorityPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Pool size: `fixed_workers`, else cores capped by `max_workers`.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        if let Some(fixed) = self.fixed_workers {
            return fixed;
        }
        let cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        cores.min(self.max_workers).max(1)
    }

    /// Per-task deadline.
    #[must_use]
    pub const fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    /// Whole-run deadline, if any.
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }

    /// Progress log interval, if enabled.
    #[must_use]
    pub fn progress_interval(&self) -> Option<Duration> {
        (self.progress_interval_secs > 0).then(|| Duration::from_secs(self.progress_interval_secs))
    }
}

const fn default_max_workers() -> usize {
    8
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_task_timeout() -> u64 {
    30_000
}

const fn default_max_respawns() -> u32 {
    3
}

const fn default_max_backoff() -> u64 {
    5_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_jitter() -> f64 {
    0.1
}

const fn default_progress_interval() -> u64 {
    5
}

const fn default_persist_capacity() -> usize {
    1_024
}

const fn default_event_capacity() -> usize {
    1_024
}
