// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Grid Optimizer - Rust Core Library
//!
//! Parallel grid search over trading-strategy parameters: one backtest task
//! per parameter combination, run on a bounded pool of supervised execution
//! units and ranked by Sharpe ratio.
//!
//! # Architecture (Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: parameter grid, tasks, results, market records
//! - **Application**: ports for the backtest, the market data store and the
//!   result sink
//! - **Cache**: four-tier in-memory cache (hot/warm/cold/compute) and warmer
//! - **Engine**: queue, worker pool, scheduler, persistence, statistics
//! - **Strategy**: reference z-score backtest behind the backtest port
//! - **Infrastructure**: market data and result sink adapters
//!
//! # Example
//!
//! ```rust,ignore
//! use grid_optimizer::config::load_config;
//!
//! let config = load_config(None)?;
//! let grid = config.grid.to_grid();
//! let report = optimizer.run(&grid).await?;
//! println!("{}", report.summary);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Layers
// =============================================================================

/// Domain layer - grid search vocabulary with no external dependencies.
pub mod domain;

/// Application layer - port definitions.
pub mod application;

/// Tiered cache for shared input series.
pub mod cache;

/// Parallel task engine.
pub mod engine;

/// Reference backtest strategy.
pub mod strategy;

/// Infrastructure layer - adapters.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// Configuration loading and validation.
pub mod config;

/// Logging and metrics.
pub mod observability;

// =============================================================================
// Re-exports
// =============================================================================

pub use application::ports::{
    BacktestInputs, BacktestPort, ComputeError, MarketDataError, MarketDataPort, NoOpResultSink,
    ResultSinkPort, SinkError,
};
pub use cache::{CacheTier, CacheWarmer, TierSelection, TieredCache};
pub use domain::{
    OptimizationRun, ParameterCombination, ParameterGrid, PerformanceMetrics, RunOutcome,
    SharedContext, TaskResult, TimeWindow,
};
pub use engine::{EngineError, EngineEvent, GridOptimizer, OptimizationReport, Scheduler, UnitContext};
pub use strategy::ZScoreBacktest;
