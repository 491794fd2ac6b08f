//! End-to-end grid search: configuration, warming, z-score backtests and
//! result persistence.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::sync::Arc;

use grid_optimizer::cache::{CacheWarmer, TieredCache};
use grid_optimizer::config::{Config, load_config_from_string};
use grid_optimizer::domain::{RatingRecord, RunOutcome};
use grid_optimizer::engine::{EngineError, GridOptimizer, Scheduler, UnitContext};
use grid_optimizer::infrastructure::{InMemoryMarketData, JsonFileMarketData, JsonLinesResultSink};
use grid_optimizer::{MarketDataPort, NoOpResultSink, ResultSinkPort, ZScoreBacktest};

const HOUR_MS: i64 = 3_600_000;
const START: i64 = 1_704_067_200_000;

const CONFIG: &str = r"
grid:
  base_asset: BTC
  quote_asset: USDT
  start_time: 1704067200000
  end_time: 1705147200000
  thresholds: { start: 0.5, end: 1.5, step: 0.5 }
  profit_percents: [1.0, 3.0]
  stop_loss_percents: [1.0, 2.0]
  moving_averages: [10, 20]
  top_n: 5
warmer:
  common_windows: [10]
scheduler:
  fixed_workers: 4
  max_retries: 1
  progress_interval_secs: 0
";

/// Oscillating rating history so the z-score crosses every threshold.
fn ratings(symbol: &str, count: usize) -> Vec<RatingRecord> {
    (0..count)
        .map(|i| {
            let phase = i as f64 / 6.0;
            RatingRecord {
                symbol: symbol.to_string(),
                timestamp: START + i as i64 * HOUR_MS,
                rating: 1_500.0 + 40.0 * phase.sin() + (i % 5) as f64,
                rating_deviation: 80.0,
                volatility: 0.06,
            }
        })
        .collect()
}

fn config() -> Config {
    let Ok(config) = load_config_from_string(CONFIG) else {
        panic!("test config should load");
    };
    config
}

fn optimizer(
    config: &Config,
    market_data: Arc<dyn MarketDataPort>,
    sink: Arc<dyn ResultSinkPort>,
) -> GridOptimizer {
    let cache = Arc::new(TieredCache::new(&config.cache));
    let warmer = Arc::new(CacheWarmer::new(
        Arc::clone(&cache),
        Arc::clone(&market_data),
        config.warmer.clone(),
    ));
    let context = UnitContext {
        cache,
        market_data,
        backtest: Arc::new(ZScoreBacktest::new(config.backtest)),
    };
    let scheduler = Scheduler::new(config.scheduler.clone(), context, sink);
    GridOptimizer::new(scheduler, warmer, config.grid.top_n)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_grid_search_ranks_every_combination() {
    let config = config();
    let grid = config.grid.to_grid();
    assert_eq!(grid.total_combinations(), 24);

    let data = InMemoryMarketData::new();
    data.insert_ratings("BTCUSDT", ratings("BTCUSDT", 300));
    let data = Arc::new(data);
    let optimizer = optimizer(&config, data.clone(), Arc::new(NoOpResultSink));

    let Ok(report) = optimizer.run(&grid).await else {
        panic!("grid search should succeed");
    };

    assert_eq!(report.run.outcome, RunOutcome::Completed);
    assert_eq!(report.run.succeeded(), 24);
    assert_eq!(report.summary.succeeded, 24);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.top.len(), 5);
    let sharpes: Vec<f64> = report.top.iter().filter_map(|r| r.sharpe()).collect();
    assert!(sharpes.windows(2).all(|pair| pair[0] >= pair[1]));
    assert_eq!(report.best().map(|r| r.task_id), report.top.first().map(|r| r.task_id));

    let Some(warm) = &report.warm else {
        panic!("warming is enabled by default");
    };
    assert_eq!(warm.warmed, vec!["BTCUSDT".to_string()]);

    // Warmed series serve every task.
    assert_eq!(data.rating_fetches(), 1);
    assert_eq!(data.price_fetches(), 1);
    assert!(report.cache.hits >= 24);
    assert!(report.cache.hit_rate() > 0.9);
}

#[tokio::test]
async fn test_missing_symbol_fails_before_dispatch() {
    let config = config();
    let data = Arc::new(InMemoryMarketData::new());
    let optimizer = optimizer(&config, data, Arc::new(NoOpResultSink));

    let result = optimizer.run(&config.grid.to_grid()).await;
    assert!(matches!(result, Err(EngineError::NoMarketData { .. })));
    assert_eq!(optimizer.scheduler().stats().total_tasks, 0);
}

#[tokio::test]
async fn test_results_stream_to_json_lines() {
    let Ok(dir) = tempfile::tempdir() else {
        panic!("temp dir should be created");
    };

    let market_path = dir.path().join("market.json");
    let Ok(mut file) = std::fs::File::create(&market_path) else {
        panic!("market file should be created");
    };
    let payload = serde_json::json!({ "ratings": ratings("BTCUSDT", 200) });
    let Ok(()) = file.write_all(payload.to_string().as_bytes()) else {
        panic!("market file should be writable");
    };

    let Ok(market_data) = JsonFileMarketData::open(&market_path).await else {
        panic!("market data should load");
    };
    let results_path = dir.path().join("out").join("results.jsonl");
    let Ok(sink) = JsonLinesResultSink::open(&results_path).await else {
        panic!("sink should open");
    };

    let config = config();
    let optimizer = optimizer(&config, Arc::new(market_data), Arc::new(sink));
    let Ok(report) = optimizer.run(&config.grid.to_grid()).await else {
        panic!("grid search should succeed");
    };
    let summary = optimizer.flush_results().await;
    assert_eq!(summary.persisted, report.run.succeeded());

    let Ok(contents) = std::fs::read_to_string(&results_path) else {
        panic!("results file should exist");
    };
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len() as u64, report.run.succeeded());
    for line in lines {
        let Ok(record) = serde_json::from_str::<serde_json::Value>(line) else {
            panic!("every line should be JSON: {line}");
        };
        assert_eq!(record["run_id"], report.run.run_id.as_str());
        assert!(record["combination"]["threshold"].is_number());
        assert!(record["metrics"].is_object());
    }
}

#[test]
fn test_config_expands_grid() {
    let config = config();
    assert_eq!(config.scheduler.pool_size(), 4);
    assert_eq!(config.grid.to_grid().moving_averages(), &[10, 20]);
}
