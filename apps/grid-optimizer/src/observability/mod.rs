//! Observability module for metrics and logging.

pub mod metrics;
mod logging;

pub use self::metrics::{
    MetricsError, init_metrics, record_cache_evictions, record_cache_lookup,
    record_persist_dropped, record_task_outcome, record_task_retry, record_unit_crash,
    update_active_units, update_cache_memory, update_queue_depth,
};
pub use self::logging::{TracingError, init_tracing};
