//! Supervised pool of execution units.
//!
//! Each unit is a tokio task with a capacity-one assignment channel, so a
//! unit never holds more than one task. A watcher awaits every unit's join
//! handle; a panic is reported to the scheduler as [`UnitReport::Crashed`].
//! Crashed units are respawned up to `max_respawns` times each, then retired.

use std::any::Any;

use serde::Serialize;
use tokio::sync::mpsc;

use super::error::EngineError;
use super::worker::{Assignment, ExecutionUnit, UnitContext, UnitReport};
use crate::domain::{Task, TaskId};

/// Execution unit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    /// Waiting for work.
    Idle,
    /// Running a task.
    Busy,
    /// Retired after exhausting its respawns.
    Terminated,
}

/// Point-in-time view of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitSnapshot {
    /// Unit identifier.
    pub id: usize,
    /// Current status.
    pub status: UnitStatus,
    /// Task being run.
    pub current_task: Option<TaskId>,
    /// Times this unit was replaced after a crash.
    pub respawns: u32,
}

/// What happened to a crashed unit.
#[derive(Debug)]
pub struct CrashOutcome {
    /// Task the unit was running, if any.
    pub task: Option<Task>,
    /// Whether a replacement was started.
    pub respawned: bool,
}

#[derive(Debug)]
struct UnitSlot {
    id: usize,
    status: UnitStatus,
    current: Option<Task>,
    respawns: u32,
    sender: Option<mpsc::Sender<Assignment>>,
}

/// Fixed-size set of supervised execution units.
#[derive(Debug)]
pub struct WorkerPool {
    slots: Vec<UnitSlot>,
    context: UnitContext,
    reports: mpsc::Sender<UnitReport>,
    max_respawns: u32,
    respawned: u64,
}

impl WorkerPool {
    /// Start `size` units reporting to `reports`.
    ///
    /// Fails when `size` is zero or no tokio runtime is available.
    pub fn start(
        size: usize,
        max_respawns: u32,
        context: UnitContext,
        reports: mpsc::Sender<UnitReport>,
    ) -> Result<Self, EngineError> {
        if size == 0 {
            return Err(EngineError::PoolInit {
                message: "pool size must be at least 1".to_string(),
            });
        }
        if let Err(e) = tokio::runtime::Handle::try_current() {
            return Err(EngineError::PoolInit {
                message: e.to_string(),
            });
        }

        let mut pool = Self {
            slots: Vec::with_capacity(size),
            context,
            reports,
            max_respawns,
            respawned: 0,
        };
        for id in 0..size {
            let sender = pool.spawn_unit(id);
            pool.slots.push(UnitSlot {
                id,
                status: UnitStatus::Idle,
                current: None,
                respawns: 0,
                sender: Some(sender),
            });
        }
        tracing::debug!(size, max_respawns, "Worker pool started");
        Ok(pool)
    }

    fn spawn_unit(&self, id: usize) -> mpsc::Sender<Assignment> {
        let (tx, rx) = mpsc::channel(1);
        let unit = ExecutionUnit::new(id, self.context.clone(), self.reports.clone());
        let handle = tokio::spawn(unit.run(rx));

        let reports = self.reports.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.await
                && e.is_panic()
            {
                let message = panic_message(e.into_panic());
                let _ = reports
                    .send(UnitReport::Crashed {
                        unit_id: id,
                        message,
                    })
                    .await;
            }
        });
        tx
    }

    /// Units the pool started with.
    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Units not retired.
    #[must_use]
    pub fn live_units(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.status != UnitStatus::Terminated)
            .count()
    }

    /// Units running a task.
    #[must_use]
    pub fn busy_units(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.status == UnitStatus::Busy)
            .count()
    }

    /// Replacements started so far.
    #[must_use]
    pub const fn respawned(&self) -> u64 {
        self.respawned
    }

    /// First idle unit.
    #[must_use]
    pub fn idle_unit(&self) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.status == UnitStatus::Idle)
            .map(|s| s.id)
    }

    /// Hand `task` to an idle unit. The task is returned if the unit cannot
    /// take it; the unit is then treated as gone.
    pub fn assign(
        &mut self,
        unit_id: usize,
        task: Task,
        deadline: tokio::time::Instant,
    ) -> Result<(), Task> {
        let Some(slot) = self.slots.get_mut(unit_id) else {
            return Err(task);
        };
        let Some(sender) = slot.sender.as_ref().filter(|_| slot.status == UnitStatus::Idle) else {
            return Err(task);
        };

        let assignment = Assignment {
            task_id: task.id,
            combination: task.combination.clone(),
            attempt: task.attempts(),
            deadline,
        };
        if sender.try_send(assignment).is_err() {
            slot.status = UnitStatus::Terminated;
            slot.sender = None;
            return Err(task);
        }
        slot.status = UnitStatus::Busy;
        slot.current = Some(task);
        Ok(())
    }

    /// Take back the task `unit_id` finished and mark the unit idle.
    ///
    /// Returns `None` for reports that no longer match the unit's current
    /// task.
    pub fn release(&mut self, unit_id: usize, task_id: TaskId) -> Option<Task> {
        let slot = self.slots.get_mut(unit_id)?;
        if slot.current.as_ref().map(|t| t.id) != Some(task_id) {
            return None;
        }
        slot.status = UnitStatus::Idle;
        slot.current.take()
    }

    /// Recover the task of a crashed unit and respawn or retire the unit.
    pub fn handle_crash(&mut self, unit_id: usize) -> CrashOutcome {
        let can_respawn = self
            .slots
            .get(unit_id)
            .is_some_and(|s| s.respawns < self.max_respawns);
        let sender = can_respawn.then(|| self.spawn_unit(unit_id));

        let Some(slot) = self.slots.get_mut(unit_id) else {
            return CrashOutcome {
                task: None,
                respawned: false,
            };
        };
        let task = slot.current.take();
        let respawned = sender.is_some();
        if respawned {
            slot.respawns += 1;
            slot.status = UnitStatus::Idle;
            self.respawned += 1;
        } else {
            slot.status = UnitStatus::Terminated;
        }
        slot.sender = sender;

        CrashOutcome { task, respawned }
    }

    /// Snapshot of every unit.
    #[must_use]
    pub fn snapshot(&self) -> Vec<UnitSnapshot> {
        self.slots
            .iter()
            .map(|s| UnitSnapshot {
                id: s.id,
                status: s.status,
                current_task: s.current.as_ref().map(|t| t.id),
                respawns: s.respawns,
            })
            .collect()
    }

    /// Stop handing out work. Running units finish their current task in
    /// the background; the tasks they hold are returned.
    pub fn shutdown(&mut self) -> Vec<Task> {
        self.slots
            .iter_mut()
            .filter_map(|slot| {
                slot.sender = None;
                slot.status = UnitStatus::Terminated;
                slot.current.take()
            })
            .collect()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "unknown panic".to_string(), |s| (*s).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::application::ports::{BacktestInputs, BacktestPort, ComputeError};
    use crate::cache::TieredCache;
    use crate::config::CacheConfig;
    use crate::domain::{
        ParameterCombination, PerformanceMetrics, RatingRecord, SharedContext, TaskPriority,
        TimeWindow,
    };
    use crate::infrastructure::InMemoryMarketData;

    #[derive(Debug)]
    struct PanickingBacktest;

    #[async_trait]
    impl BacktestPort for PanickingBacktest {
        async fn compute(
            &self,
            _combination: &ParameterCombination,
            _inputs: &BacktestInputs,
        ) -> Result<PerformanceMetrics, ComputeError> {
            panic!("simulated unit failure");
        }
    }

    fn context() -> UnitContext {
        let data = InMemoryMarketData::new();
        data.insert_ratings(
            "BTCUSDT",
            vec![RatingRecord {
                symbol: "BTCUSDT".to_string(),
                timestamp: 0,
                rating: 1_500.0,
                rating_deviation: 350.0,
                volatility: 0.06,
            }],
        );
        UnitContext {
            cache: Arc::new(TieredCache::new(&CacheConfig::default())),
            market_data: Arc::new(data),
            backtest: Arc::new(PanickingBacktest),
        }
    }

    fn task(id: u64) -> Task {
        let combination = ParameterCombination {
            threshold: 1.0,
            profit_percent: 5.0,
            stop_loss_percent: 2.0,
            moving_average: 1,
            context: SharedContext {
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                window: TimeWindow::new(0, 10),
            },
        };
        Task::new(TaskId(id), combination, TaskPriority::Normal)
    }

    fn deadline() -> tokio::time::Instant {
        tokio::time::Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_zero_size_is_pool_init_error() {
        let (tx, _rx) = mpsc::channel(1);
        let result = WorkerPool::start(0, 1, context(), tx);
        assert!(matches!(result, Err(EngineError::PoolInit { .. })));
    }

    #[tokio::test]
    async fn test_one_task_per_unit() {
        let (tx, _rx) = mpsc::channel(4);
        let Ok(mut pool) = WorkerPool::start(1, 0, context(), tx) else {
            panic!("pool should start");
        };
        assert_eq!(pool.idle_unit(), Some(0));
        assert!(pool.assign(0, task(0), deadline()).is_ok());
        assert_eq!(pool.busy_units(), 1);
        assert_eq!(pool.idle_unit(), None);

        let Err(rejected) = pool.assign(0, task(1), deadline()) else {
            panic!("busy unit should reject a second task");
        };
        assert_eq!(rejected.id, TaskId(1));
    }

    #[tokio::test]
    async fn test_crash_respawns_then_retires() {
        let (tx, mut rx) = mpsc::channel(4);
        let Ok(mut pool) = WorkerPool::start(1, 1, context(), tx) else {
            panic!("pool should start");
        };

        for (round, expect_respawn) in [(0_u64, true), (1, false)] {
            assert!(pool.assign(0, task(round), deadline()).is_ok());
            let Some(UnitReport::Crashed { unit_id, message }) = rx.recv().await else {
                panic!("crash should be reported");
            };
            assert_eq!(unit_id, 0);
            assert!(message.contains("simulated unit failure"));

            let crash = pool.handle_crash(unit_id);
            assert_eq!(crash.task.map(|t| t.id), Some(TaskId(round)));
            assert_eq!(crash.respawned, expect_respawn);
        }

        assert_eq!(pool.live_units(), 0);
        assert_eq!(pool.respawned(), 1);
        let snapshot = pool.snapshot();
        assert_eq!(snapshot[0].status, UnitStatus::Terminated);
        assert_eq!(snapshot[0].respawns, 1);
    }

    #[tokio::test]
    async fn test_release_ignores_stale_reports() {
        let (tx, _rx) = mpsc::channel(4);
        let Ok(mut pool) = WorkerPool::start(2, 0, context(), tx) else {
            panic!("pool should start");
        };
        assert!(pool.assign(1, task(5), deadline()).is_ok());
        assert!(pool.release(1, TaskId(4)).is_none());
        assert_eq!(pool.release(1, TaskId(5)).map(|t| t.id), Some(TaskId(5)));
        assert_eq!(pool.busy_units(), 0);

        let held = pool.shutdown();
        assert!(held.is_empty());
        assert_eq!(pool.live_units(), 0);
    }
}
