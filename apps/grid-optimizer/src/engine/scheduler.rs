//! Task scheduler.
//!
//! # Task lifecycle
//!
//! ```text
//! QUEUED ──dispatch──► ASSIGNED ──ok──────────────► COMPLETED
//!    ▲  ▲                  │
//!    │  │                  ├─error/timeout──► REQUEUED ──backoff──► QUEUED
//!    │  │                  │   (retries left)
//!    │  └────unit crash────┤
//!    └─────────────────────┘
//!                          └─error, no retries left─► FAILED
//! ```
//!
//! A task orphaned by a crashed unit goes straight back to its band without
//! spending a retry; respawn limits bound how often that can happen.
//!
//! The dispatch loop owns the queue and the pool outright; units talk to it
//! only through channels, and completion is signalled by their reports
//! rather than polled.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::EngineError;
use super::events::EngineEvent;
use super::persister::{PersistSummary, ResultPersister};
use super::pool::WorkerPool;
use super::queue::TaskQueue;
use super::retry::{RetryDecision, RetryPolicy};
use super::stats::{EngineStats, StatsCollector};
use super::worker::{AttemptOutcome, UnitContext, UnitReport};
use crate::application::ports::ResultSinkPort;
use crate::config::SchedulerConfig;
use crate::domain::{
    OptimizationRun, ParameterCombination, RunOutcome, Task, TaskError, TaskErrorKind, TaskId,
    TaskPriority, TaskResult, TaskStatus,
};
use crate::observability::metrics as telemetry;

/// Mutable state of one run, owned by the dispatch loop.
struct RunState {
    run_id: String,
    combinations: Vec<ParameterCombination>,
    queue: TaskQueue,
    pool: WorkerPool,
    results: BTreeMap<TaskId, TaskResult>,
    persister: ResultPersister,
    requeue_tx: mpsc::UnboundedSender<Task>,
    delayed: usize,
}

/// Runs parameter combinations on a pool of execution units.
pub struct Scheduler {
    config: SchedulerConfig,
    retry: RetryPolicy,
    context: UnitContext,
    sink: Arc<dyn ResultSinkPort>,
    events: broadcast::Sender<EngineEvent>,
    stats: Arc<StatsCollector>,
    persisters: Mutex<Vec<JoinHandle<PersistSummary>>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(config: SchedulerConfig, context: UnitContext, sink: Arc<dyn ResultSinkPort>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            retry: RetryPolicy::from_config(&config),
            config,
            context,
            sink,
            events,
            stats: Arc::new(StatsCollector::new()),
            persisters: Mutex::new(Vec::new()),
        }
    }

    /// Scheduler settings.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Statistics of the current or most recent run.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot(self.context.cache.memory_usage_bytes())
    }

    /// Wait until every finished run's results have reached the sink.
    pub async fn flush_results(&self) -> PersistSummary {
        let handles: Vec<JoinHandle<PersistSummary>> = std::mem::take(&mut *self.persisters.lock());
        let mut summary = PersistSummary::default();
        for handle in handles {
            match handle.await {
                Ok(drained) => summary = summary.merge(drained),
                Err(e) => warn!(error = %e, "Result persister task failed"),
            }
        }
        summary
    }

    /// Run one task per combination until every task is terminal, the run
    /// deadline passes, or no execution unit is left.
    pub async fn run_optimization(
        &self,
        combinations: Vec<ParameterCombination>,
    ) -> Result<OptimizationRun, EngineError> {
        if combinations.is_empty() {
            return Err(EngineError::EmptyGrid);
        }

        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let total_tasks = combinations.len() as u64;
        let pool_size = self.config.pool_size();

        let (report_tx, mut report_rx) = mpsc::channel(pool_size.max(1) * 2);
        let pool = WorkerPool::start(
            pool_size,
            self.config.max_respawns_per_unit,
            self.context.clone(),
            report_tx,
        )?;
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel();

        let mut queue = TaskQueue::new();
        for (index, combination) in combinations.iter().enumerate() {
            let priority = self.config.priority.classify(combination);
            queue.push(Task::new(TaskId(index as u64), combination.clone(), priority));
        }

        info!(
            run_id = %run_id,
            total_tasks,
            pool_size,
            high = queue.len_of(TaskPriority::High),
            normal = queue.len_of(TaskPriority::Normal),
            low = queue.len_of(TaskPriority::Low),
            max_retries = self.retry.max_retries(),
            "Starting optimization run"
        );

        let mut run = RunState {
            persister: ResultPersister::spawn(
                run_id.clone(),
                Arc::clone(&self.sink),
                self.config.persist_queue_capacity,
            ),
            run_id,
            combinations,
            queue,
            pool,
            results: BTreeMap::new(),
            requeue_tx,
            delayed: 0,
        };
        self.emit(EngineEvent::Started {
            run_id: run.run_id.clone(),
            total_tasks,
            pool_size,
        });

        let deadline = self
            .config
            .run_timeout()
            .map(|budget| tokio::time::Instant::now() + budget);
        let mut progress = self.config.progress_interval().map(|period| {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        let outcome = loop {
            self.dispatch(&mut run);

            if run.results.len() as u64 == total_tasks {
                break RunOutcome::Completed;
            }
            if run.pool.live_units() == 0 {
                warn!(
                    run_id = %run.run_id,
                    remaining = total_tasks - run.results.len() as u64,
                    "Every execution unit retired, stopping run"
                );
                break RunOutcome::PoolExhausted;
            }

            tokio::select! {
                Some(report) = report_rx.recv() => self.handle_report(&mut run, report),
                Some(task) = requeue_rx.recv() => {
                    run.delayed = run.delayed.saturating_sub(1);
                    run.queue.push(task);
                }
                () = sleep_until(deadline) => {
                    warn!(
                        run_id = %run.run_id,
                        in_flight = run.pool.busy_units(),
                        queued = run.queue.len() + run.delayed,
                        "Run deadline reached, stopping dispatch"
                    );
                    break RunOutcome::DeadlineExceeded;
                }
                () = next_tick(&mut progress) => self.report_progress(),
            }
        };

        Ok(self.finish(run, outcome, started, pool_size))
    }

    fn finish(
        &self,
        mut run: RunState,
        outcome: RunOutcome,
        started: Instant,
        pool_size: usize,
    ) -> OptimizationRun {
        let total_time_ms = started.elapsed().as_millis() as u64;
        let total_tasks = run.combinations.len() as u64;
        let in_flight = run.pool.shutdown();
        if !in_flight.is_empty() {
            debug!(
                run_id = %run.run_id,
                count = in_flight.len(),
                "Discarding results of tasks still running"
            );
        }
        self.persisters.lock().push(run.persister.close());
        telemetry::update_queue_depth(0);
        telemetry::update_active_units(0);

        let unfinished: Vec<ParameterCombination> = run
            .combinations
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !run.results.contains_key(&TaskId(*index as u64)))
            .map(|(_, combination)| combination)
            .collect();

        let result = OptimizationRun {
            run_id: run.run_id,
            outcome,
            results: run.results.into_values().collect(),
            unfinished,
            total_tasks,
            total_time_ms,
            pool_size,
            units_respawned: run.pool.respawned(),
        };

        self.emit(EngineEvent::Completed {
            run_id: result.run_id.clone(),
            outcome,
            completed: result.succeeded(),
            failed: result.failed(),
            total_time_ms,
        });
        info!(
            run_id = %result.run_id,
            outcome = %outcome,
            completed = result.succeeded(),
            failed = result.failed(),
            unfinished = result.unfinished.len(),
            total_time_ms,
            parallel_efficiency = result.parallel_efficiency(),
            "Optimization run finished"
        );
        result
    }

    fn dispatch(&self, run: &mut RunState) {
        while let Some(unit_id) = run.pool.idle_unit() {
            let Some(mut task) = run.queue.pop() else {
                break;
            };
            task.mark_assigned();
            let task_id = task.id;
            let attempt = task.attempts();
            let deadline = tokio::time::Instant::now() + self.config.task_timeout();

            match run.pool.assign(unit_id, task, deadline) {
                Ok(()) => {
                    debug!(task_id = %task_id, unit_id, attempt, "Task assigned");
                    self.emit(EngineEvent::TaskStarted {
                        task_id,
                        unit_id,
                        attempt,
                    });
                }
                Err(task) => {
                    warn!(unit_id, task_id = %task_id, "Execution unit unavailable, returning task to queue");
                    run.queue.push_front(task);
                }
            }
        }
        telemetry::update_queue_depth(run.queue.len());
        telemetry::update_active_units(run.pool.busy_units());
    }

    fn handle_report(&self, run: &mut RunState, report: UnitReport) {
        match report {
            UnitReport::Finished(outcome) => self.handle_outcome(run, outcome),
            UnitReport::Crashed { unit_id, message } => self.handle_crash(run, unit_id, message),
        }
    }

    fn handle_outcome(&self, run: &mut RunState, outcome: AttemptOutcome) {
        let AttemptOutcome {
            unit_id,
            task_id,
            result,
            execution_time_ms,
            memory_delta_bytes,
        } = outcome;
        let Some(task) = run.pool.release(unit_id, task_id) else {
            debug!(unit_id, task_id = %task_id, "Ignoring stale unit report");
            return;
        };

        match result {
            Ok(metrics) => {
                telemetry::record_task_outcome("completed", None, execution_time_ms as f64 / 1000.0);
                run.persister.submit(&task.combination, &metrics);
                self.emit(EngineEvent::TaskCompleted {
                    task_id,
                    unit_id,
                    execution_time_ms,
                });
                run.results.insert(
                    task_id,
                    TaskResult {
                        task_id,
                        combination: task.combination.clone(),
                        status: TaskStatus::Completed,
                        metrics: Some(metrics),
                        error: None,
                        attempts: task.attempts(),
                        execution_time_ms,
                        memory_delta_bytes,
                        unit_id: Some(unit_id),
                    },
                );
            }
            Err(error) => self.handle_failure(
                run,
                task,
                error,
                unit_id,
                execution_time_ms,
                memory_delta_bytes,
            ),
        }
    }

    fn handle_crash(&self, run: &mut RunState, unit_id: usize, message: String) {
        let crash = run.pool.handle_crash(unit_id);
        telemetry::record_unit_crash(crash.respawned);
        error!(
            unit_id,
            respawned = crash.respawned,
            live_units = run.pool.live_units(),
            panic = %message,
            "Execution unit crashed"
        );
        self.emit(EngineEvent::UnitCrashed {
            unit_id,
            task_id: crash.task.as_ref().map(|t| t.id),
            respawned: crash.respawned,
        });

        // The interrupted attempt does not count against the retry budget.
        if let Some(task) = crash.task {
            telemetry::record_task_retry(TaskErrorKind::UnitCrash.as_str());
            warn!(
                task_id = %task.id,
                attempt = task.attempts(),
                params = %task.combination.label(),
                "Requeueing task from crashed unit"
            );
            run.queue.push(task);
        }
    }

    fn handle_failure(
        &self,
        run: &mut RunState,
        mut task: Task,
        error: TaskError,
        unit_id: usize,
        execution_time_ms: u64,
        memory_delta_bytes: i64,
    ) {
        let attempt = task.attempts();
        let decision = self.retry.decide(&mut task, &error);
        let will_retry = matches!(decision, RetryDecision::Requeue { .. });

        if error.kind == TaskErrorKind::Timeout {
            self.emit(EngineEvent::TaskTimeout {
                task_id: task.id,
                unit_id,
                attempt,
                will_retry,
            });
        } else {
            self.emit(EngineEvent::TaskFailed {
                task_id: task.id,
                error: error.clone(),
                attempt,
                will_retry,
            });
        }

        match decision {
            RetryDecision::Requeue { delay } => {
                telemetry::record_task_retry(error.kind.as_str());
                warn!(
                    task_id = %task.id,
                    attempt,
                    retry = task.retry_count,
                    max_retries = self.retry.max_retries(),
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Task attempt failed, requeueing"
                );
                self.requeue(run, task, delay);
            }
            RetryDecision::Fail => {
                telemetry::record_task_outcome(
                    "failed",
                    Some(error.kind.as_str()),
                    execution_time_ms as f64 / 1000.0,
                );
                warn!(
                    task_id = %task.id,
                    attempts = attempt,
                    params = %task.combination.label(),
                    error = %error,
                    "Task failed permanently"
                );
                run.results.insert(
                    task.id,
                    TaskResult {
                        task_id: task.id,
                        combination: task.combination,
                        status: TaskStatus::Failed,
                        metrics: None,
                        error: Some(error),
                        attempts: attempt,
                        execution_time_ms,
                        memory_delta_bytes,
                        unit_id: Some(unit_id),
                    },
                );
            }
        }
    }

    fn requeue(&self, run: &mut RunState, task: Task, delay: Duration) {
        if delay.is_zero() {
            run.queue.push(task);
            return;
        }
        run.delayed += 1;
        let requeue_tx = run.requeue_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = requeue_tx.send(task);
        });
    }

    fn report_progress(&self) {
        let stats = self.stats();
        info!(
            completed = stats.completed,
            failed = stats.failed,
            total = stats.total_tasks,
            active = stats.active,
            queued = stats.queued,
            success_rate = stats.success_rate,
            throughput = stats.throughput,
            eta_secs = stats.eta_secs,
            "Progress"
        );
        self.emit(EngineEvent::Progress(stats));
    }

    fn emit(&self, event: EngineEvent) {
        self.stats.observe(&event);
        let _ = self.events.send(event);
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::NoOpResultSink;
    use crate::cache::TieredCache;
    use crate::config::CacheConfig;
    use crate::infrastructure::InMemoryMarketData;
    use crate::strategy::ZScoreBacktest;

    fn scheduler() -> Scheduler {
        let context = UnitContext {
            cache: Arc::new(TieredCache::new(&CacheConfig::default())),
            market_data: Arc::new(InMemoryMarketData::new()),
            backtest: Arc::new(ZScoreBacktest::default()),
        };
        let config = SchedulerConfig {
            fixed_workers: Some(2),
            ..SchedulerConfig::default()
        };
        Scheduler::new(config, context, Arc::new(NoOpResultSink))
    }

    #[tokio::test]
    async fn test_empty_grid_rejected() {
        let result = scheduler().run_optimization(Vec::new()).await;
        assert!(matches!(result, Err(EngineError::EmptyGrid)));
    }

    #[tokio::test]
    async fn test_zero_workers_is_pool_init_error() {
        let mut scheduler = scheduler();
        scheduler.config.fixed_workers = Some(0);
        let combination = ParameterCombination {
            threshold: 1.0,
            profit_percent: 5.0,
            stop_loss_percent: 2.0,
            moving_average: 20,
            context: crate::domain::SharedContext {
                base_asset: "BTC".to_string(),
                quote_asset: "USDT".to_string(),
                window: crate::domain::TimeWindow::new(0, 1),
            },
        };
        let result = scheduler.run_optimization(vec![combination]).await;
        assert!(matches!(result, Err(EngineError::PoolInit { .. })));
    }

    #[tokio::test]
    async fn test_sleep_until_none_never_fires() {
        let fired = tokio::time::timeout(Duration::from_millis(20), sleep_until(None)).await;
        assert!(fired.is_err());
    }
}
