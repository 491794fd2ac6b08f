//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence; otherwise the configured level applies to
//! this crate.
//!
//! # Key Spans
//!
//! - `task.execute` - One attempt of one task on an execution unit
//! - `optimizer.run` - Whole optimization run

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Error type for tracing operations.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// Invalid filter directive.
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter {
        /// Rejected directive.
        directive: String,
        /// Parser message.
        message: String,
    },
    /// Failed to initialize tracing subscriber.
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberError(String),
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the level is not a valid directive or a subscriber is
/// already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directive = format!("grid_optimizer={}", config.level);
            EnvFilter::try_new(&directive).map_err(|e| TracingError::InvalidFilter {
                directive,
                message: e.to_string(),
            })?
        }
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| TracingError::SubscriberError(e.to_string()))
}
