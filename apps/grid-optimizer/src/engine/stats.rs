//! Run statistics derived from engine events.
//!
//! The collector only observes; it never touches scheduler state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::events::EngineEvent;

/// Point-in-time run statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Tasks enumerated.
    pub total_tasks: u64,
    /// Tasks that produced metrics.
    pub completed: u64,
    /// Tasks that failed permanently.
    pub failed: u64,
    /// Tasks currently assigned to a unit.
    pub active: u64,
    /// Tasks waiting for dispatch (including those in backoff).
    pub queued: u64,
    /// Requeues so far.
    pub retries: u64,
    /// Completed tasks per second.
    pub throughput: f64,
    /// Estimated cache footprint.
    pub memory_usage_bytes: usize,
    /// Estimated seconds remaining.
    pub eta_secs: u64,
    /// completed / (completed + failed).
    pub success_rate: f64,
    /// Seconds since the run started.
    pub elapsed_secs: f64,
}

impl EngineStats {
    /// Share of tasks in a terminal state, in percent.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_tasks == 0 {
            100.0
        } else {
            ((self.completed + self.failed) as f64 / self.total_tasks as f64) * 100.0
        }
    }
}

/// Event-driven statistics collector.
#[derive(Debug, Default)]
pub struct StatsCollector {
    total_tasks: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    active: AtomicU64,
    retries: AtomicU64,
    started_at: Mutex<Option<Instant>>,
}

impl StatsCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the counters.
    pub fn observe(&self, event: &EngineEvent) {
        match event {
            EngineEvent::Started { total_tasks, .. } => {
                self.total_tasks.store(*total_tasks, Ordering::Relaxed);
                self.completed.store(0, Ordering::Relaxed);
                self.failed.store(0, Ordering::Relaxed);
                self.active.store(0, Ordering::Relaxed);
                self.retries.store(0, Ordering::Relaxed);
                *self.started_at.lock() = Some(Instant::now());
            }
            EngineEvent::TaskStarted { .. } => {
                self.active.fetch_add(1, Ordering::Relaxed);
            }
            EngineEvent::TaskCompleted { .. } => {
                self.finish_attempt();
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            EngineEvent::TaskFailed { will_retry, .. }
            | EngineEvent::TaskTimeout { will_retry, .. } => {
                self.finish_attempt();
                if *will_retry {
                    self.retries.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            EngineEvent::UnitCrashed { .. }
            | EngineEvent::Progress(_)
            | EngineEvent::Completed { .. } => {}
        }
    }

    fn finish_attempt(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Current statistics. `memory_usage_bytes` is supplied by the caller.
    #[must_use]
    pub fn snapshot(&self, memory_usage_bytes: usize) -> EngineStats {
        let total_tasks = self.total_tasks.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let active = self.active.load(Ordering::Relaxed);
        let elapsed_secs = self
            .started_at
            .lock()
            .map_or(0.0, |started| started.elapsed().as_secs_f64());

        let throughput = if elapsed_secs > 0.0 {
            completed as f64 / elapsed_secs
        } else {
            0.0
        };
        let remaining = total_tasks.saturating_sub(completed + failed);
        let eta_secs = if throughput > 0.0 {
            (remaining as f64 / throughput) as u64
        } else {
            0
        };
        let terminal = completed + failed;
        let success_rate = if terminal == 0 {
            0.0
        } else {
            completed as f64 / terminal as f64
        };

        EngineStats {
            total_tasks,
            completed,
            failed,
            active,
            queued: remaining.saturating_sub(active),
            retries: self.retries.load(Ordering::Relaxed),
            throughput,
            memory_usage_bytes,
            eta_secs,
            success_rate,
            elapsed_secs,
        }
    }

    /// Feed a collector from an event subscription until the run completes
    /// or the channel closes.
    pub fn spawn(mut events: broadcast::Receiver<EngineEvent>) -> (Arc<Self>, JoinHandle<()>) {
        let collector = Arc::new(Self::new());
        let observer = Arc::clone(&collector);
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        observer.observe(&event);
                        if matches!(event, EngineEvent::Completed { .. }) {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Stats collector lagged behind engine events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        (collector, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskError, TaskErrorKind, TaskId};

    fn started(total_tasks: u64) -> EngineEvent {
        EngineEvent::Started {
            run_id: "run".to_string(),
            total_tasks,
            pool_size: 2,
        }
    }

    fn task_started(id: u64) -> EngineEvent {
        EngineEvent::TaskStarted {
            task_id: TaskId(id),
            unit_id: 0,
            attempt: 1,
        }
    }

    fn failed(id: u64, will_retry: bool) -> EngineEvent {
        EngineEvent::TaskFailed {
            task_id: TaskId(id),
            error: TaskError::new(TaskErrorKind::TransientCompute, "boom"),
            attempt: 1,
            will_retry,
        }
    }

    #[test]
    fn test_counts_from_events() {
        let stats = StatsCollector::new();
        stats.observe(&started(10));
        for id in 0..4 {
            stats.observe(&task_started(id));
        }
        stats.observe(&EngineEvent::TaskCompleted {
            task_id: TaskId(0),
            unit_id: 0,
            execution_time_ms: 5,
        });
        stats.observe(&EngineEvent::TaskCompleted {
            task_id: TaskId(1),
            unit_id: 1,
            execution_time_ms: 5,
        });
        stats.observe(&failed(2, true));
        stats.observe(&failed(3, false));

        let snapshot = stats.snapshot(1_024);
        assert_eq!(snapshot.total_tasks, 10);
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.active, 0);
        assert_eq!(snapshot.queued, 7);
        assert_eq!(snapshot.memory_usage_bytes, 1_024);
        assert!((snapshot.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((snapshot.percentage() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_run_has_zero_rates() {
        let stats = StatsCollector::new();
        let snapshot = stats.snapshot(0);
        assert_eq!(snapshot.throughput, 0.0);
        assert_eq!(snapshot.eta_secs, 0);
        assert_eq!(snapshot.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_spawned_collector_follows_channel() {
        let (tx, rx) = broadcast::channel(16);
        let (stats, handle) = StatsCollector::spawn(rx);

        let _ = tx.send(started(1));
        let _ = tx.send(task_started(0));
        let _ = tx.send(EngineEvent::TaskCompleted {
            task_id: TaskId(0),
            unit_id: 0,
            execution_time_ms: 1,
        });
        let _ = tx.send(EngineEvent::Completed {
            run_id: "run".to_string(),
            outcome: crate::domain::RunOutcome::Completed,
            completed: 1,
            failed: 0,
            total_time_ms: 1,
        });

        let Ok(()) = handle.await else {
            panic!("collector task should finish");
        };
        assert_eq!(stats.snapshot(0).completed, 1);
    }
}
