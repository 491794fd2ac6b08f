//! Result sink adapters.

mod in_memory;
mod jsonl;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ParameterCombination, PerformanceMetrics};

pub use in_memory::InMemoryResultSink;
pub use jsonl::JsonLinesResultSink;

/// One persisted backtest result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedResult {
    /// Run that produced the result.
    pub run_id: String,
    /// Parameters evaluated.
    pub combination: ParameterCombination,
    /// Metrics produced.
    pub metrics: PerformanceMetrics,
    /// When the sink accepted the record.
    pub persisted_at: DateTime<Utc>,
}

impl PersistedResult {
    fn new(run_id: &str, combination: &ParameterCombination, metrics: &PerformanceMetrics) -> Self {
        Self {
            run_id: run_id.to_string(),
            combination: combination.clone(),
            metrics: metrics.clone(),
            persisted_at: Utc::now(),
        }
    }
}
