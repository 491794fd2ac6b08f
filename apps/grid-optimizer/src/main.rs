//! Grid Optimizer Binary
//!
//! Runs a parameter grid search described by a YAML file.
//!
//! # Usage
//!
//! ```bash
//! GRID_CONFIG=grid.yaml cargo run --bin grid-optimizer
//! ```
//!
//! # Environment Variables
//!
//! - `GRID_CONFIG`: path to the YAML configuration (default: grid.yaml)
//! - `RUST_LOG`: log filter, overrides `observability.logging.level`
//!
//! # Exit Codes
//!
//! - 0: every task reached a terminal state
//! - 1: setup failed before any task ran
//! - 2: the run stopped early (deadline, exhausted pool, or interrupt)

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use grid_optimizer::application::ports::{NoOpResultSink, ResultSinkPort};
use grid_optimizer::cache::{CacheWarmer, TieredCache};
use grid_optimizer::config::{Config, SinkKind, load_config};
use grid_optimizer::engine::{GridOptimizer, OptimizationReport, Scheduler, UnitContext};
use grid_optimizer::infrastructure::{InMemoryResultSink, JsonFileMarketData, JsonLinesResultSink};
use grid_optimizer::observability::{init_metrics, init_tracing};
use grid_optimizer::strategy::ZScoreBacktest;
use grid_optimizer::RunOutcome;
use tokio_util::sync::CancellationToken;

/// Default configuration path.
const DEFAULT_CONFIG_PATH: &str = "grid.yaml";

/// Exit code for runs that stopped before every task was terminal.
const EXIT_INCOMPLETE: u8 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    load_dotenv();

    let config_path =
        std::env::var("GRID_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(Some(&config_path))
        .with_context(|| format!("loading configuration from {config_path}"))?;

    init_tracing(&config.observability.logging).context("initializing logging")?;
    init_metrics(&config.observability.metrics).context("initializing metrics")?;

    tracing::info!(
        config = %config_path,
        symbol = %config.grid.context().symbol(),
        workers = config.scheduler.pool_size(),
        "Starting grid optimizer"
    );

    let shutdown = CancellationToken::new();
    let optimizer = build_optimizer(&config, &shutdown).await?;
    let grid = config.grid.to_grid();

    let report = tokio::select! {
        report = optimizer.run(&grid) => report.context("grid search setup failed")?,
        () = shutdown_signal() => {
            tracing::warn!("Interrupted, abandoning run");
            shutdown.cancel();
            return Ok(ExitCode::from(EXIT_INCOMPLETE));
        }
    };

    let persisted = optimizer.flush_results().await;
    tracing::info!(
        persisted = persisted.persisted,
        failed = persisted.failed,
        dropped = persisted.dropped,
        "Results flushed"
    );
    shutdown.cancel();

    print_report(&report);

    if report.run.outcome == RunOutcome::Completed {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_INCOMPLETE))
    }
}

/// Wire the cache, adapters and engine together.
async fn build_optimizer(config: &Config, shutdown: &CancellationToken) -> anyhow::Result<GridOptimizer> {
    let cache = Arc::new(TieredCache::new(&config.cache));
    let _sweeper = cache.spawn_sweeper(config.cache.sweep_interval(), shutdown.clone());

    let market_data = Arc::new(
        JsonFileMarketData::open(&config.data.path)
            .await
            .with_context(|| format!("loading market data from {}", config.data.path))?,
    );
    let sink = create_sink(config).await?;

    let warmer = Arc::new(CacheWarmer::new(
        Arc::clone(&cache),
        market_data.clone(),
        config.warmer.clone(),
    ));
    if let Some(interval) = config.warmer.refresh_interval() {
        let _refresh = warmer.spawn_refresh(interval, shutdown.clone());
    }

    let context = UnitContext {
        cache,
        market_data,
        backtest: Arc::new(ZScoreBacktest::new(config.backtest)),
    };
    let scheduler = Scheduler::new(config.scheduler.clone(), context, sink);
    Ok(GridOptimizer::new(scheduler, warmer, config.grid.top_n))
}

async fn create_sink(config: &Config) -> anyhow::Result<Arc<dyn ResultSinkPort>> {
    let sink: Arc<dyn ResultSinkPort> = match config.sink.kind {
        SinkKind::None => Arc::new(NoOpResultSink),
        SinkKind::Memory => Arc::new(InMemoryResultSink::new()),
        SinkKind::JsonLines => Arc::new(
            JsonLinesResultSink::open(&config.sink.path)
                .await
                .with_context(|| format!("opening result file {}", config.sink.path))?,
        ),
    };
    Ok(sink)
}

fn print_report(report: &OptimizationReport) {
    print!("{}", report.summary);
    if report.top.is_empty() {
        println!("No successful combinations.");
        return;
    }
    println!("Top {} by Sharpe ratio:", report.top.len());
    for (rank, result) in report.top.iter().enumerate() {
        let Some(metrics) = &result.metrics else {
            continue;
        };
        println!(
            "  {:>2}. {}  sharpe={:.3} return={:.2}% drawdown={:.2}% trades={} win={:.1}%",
            rank + 1,
            result.combination.label(),
            metrics.sharpe_ratio,
            metrics.total_return * 100.0,
            metrics.max_drawdown * 100.0,
            metrics.total_trades,
            metrics.win_ratio * 100.0
        );
    }
    println!(
        "Cache: hit rate {:.1}%, {} entries, {} bytes, compression ratio {:.2}",
        report.cache.hit_rate() * 100.0,
        report.cache.entries(),
        report.cache.memory_bytes(),
        report.cache.compression_ratio()
    );
}

/// Load environment variables from `.env`, searching parent directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
