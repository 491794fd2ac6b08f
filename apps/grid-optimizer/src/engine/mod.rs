//! Parallel Task Engine
//!
//! Runs one backtest task per parameter combination on a bounded pool of
//! supervised execution units.
//!
//! # Components
//!
//! - [`TaskQueue`]: priority bands, FIFO inside a band
//! - [`WorkerPool`]: execution units, crash supervision, bounded respawn
//! - [`ExecutionUnit`]: one task at a time, inputs through the cache
//! - [`Scheduler`]: dispatch, per-task and run deadlines, retries
//! - [`RetryPolicy`]: retry budget and requeue backoff
//! - [`ResultPersister`]: fire-and-forget hand-off to the result sink
//! - [`StatsCollector`]: throughput, ETA and success rate from events
//! - [`GridOptimizer`]: grid → warm → run → rank

mod error;
mod events;
mod optimizer;
mod persister;
mod pool;
mod queue;
mod retry;
mod scheduler;
mod stats;
mod worker;

pub use error::EngineError;
pub use events::EngineEvent;
pub use optimizer::{FailureSummary, GridOptimizer, OptimizationReport, RunSummary};
pub use persister::{PersistSummary, ResultPersister};
pub use pool::{CrashOutcome, UnitSnapshot, UnitStatus, WorkerPool};
pub use queue::TaskQueue;
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::Scheduler;
pub use stats::{EngineStats, StatsCollector};
pub use worker::{Assignment, AttemptOutcome, ExecutionUnit, UnitContext, UnitReport};
