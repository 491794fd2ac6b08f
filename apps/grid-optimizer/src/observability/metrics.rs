//! Prometheus metrics for the grid optimizer.
//!
//! Recording functions are cheap no-ops until [`init_metrics`] installs the
//! exporter.
//!
//! # Example
//!
//! ```ignore
//! use grid_optimizer::observability::{init_metrics, record_task_outcome};
//!
//! init_metrics(&config.observability.metrics)?;
//! record_task_outcome("completed", None, 0.42);
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::cache::CacheTier;
use crate::config::MetricsConfig;

/// Task duration buckets from 1ms to 60s.
const TASK_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Initialize the Prometheus metrics exporter.
///
/// Starts an HTTP listener exposing `/metrics` on the configured port.
/// Does nothing when metrics are disabled.
///
/// # Errors
///
/// Returns an error if the exporter fails to start (e.g., port already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(TASK_DURATION_BUCKETS)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %addr, "Prometheus metrics exporter started");
    Ok(())
}

// ============================================================================
// Cache Metrics
// ============================================================================

/// Record a cache lookup; `None` is a miss.
pub fn record_cache_lookup(tier: Option<CacheTier>) {
    let outcome = tier.map_or("miss", CacheTier::as_str);
    counter!("cache_lookups_total", "outcome" => outcome).increment(1);
}

/// Record entries evicted from `tier` for capacity.
pub fn record_cache_evictions(tier: &'static str, count: usize) {
    counter!("cache_evictions_total", "tier" => tier).increment(count as u64);
}

/// Update the cache memory gauge.
pub fn update_cache_memory(bytes: usize) {
    gauge!("cache_memory_bytes").set(bytes as f64);
}

// ============================================================================
// Scheduler Metrics
// ============================================================================

/// Record a terminal task outcome.
///
/// # Arguments
///
/// * `status` - "completed" or "failed"
/// * `error_kind` - Failure kind label, if any
/// * `duration_seconds` - Execution time of the final attempt
pub fn record_task_outcome(status: &'static str, error_kind: Option<&'static str>, duration_seconds: f64) {
    counter!(
        "tasks_total",
        "status" => status,
        "error_kind" => error_kind.unwrap_or("none")
    )
    .increment(1);

    histogram!("task_duration_seconds", "status" => status).record(duration_seconds);
}

/// Record a task requeue.
pub fn record_task_retry(error_kind: &'static str) {
    counter!("task_retries_total", "error_kind" => error_kind).increment(1);
}

/// Record an execution unit crash.
pub fn record_unit_crash(respawned: bool) {
    counter!(
        "unit_crashes_total",
        "respawned" => if respawned { "true" } else { "false" }
    )
    .increment(1);
}

/// Update the queued tasks gauge.
pub fn update_queue_depth(depth: usize) {
    gauge!("task_queue_depth").set(depth as f64);
}

/// Update the busy units gauge.
pub fn update_active_units(active: usize) {
    gauge!("active_units").set(active as f64);
}

/// Record a result dropped by the persister.
pub fn record_persist_dropped() {
    counter!("persist_dropped_total").increment(1);
}
