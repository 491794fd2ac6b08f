//! Engine errors.
//!
//! Per-task failures never surface here; they are recorded in the run's
//! results. Only setup problems reach the caller.

use thiserror::Error;

/// Errors that abort a run before or while it starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No execution unit could be started.
    #[error("Failed to start execution units: {message}")]
    PoolInit {
        /// Error details.
        message: String,
    },

    /// The parameter grid produced no combinations.
    #[error("Parameter grid produced no combinations")]
    EmptyGrid,

    /// No input series could be loaded for the run.
    #[error("No market data available: {message}")]
    NoMarketData {
        /// Error details.
        message: String,
    },
}
