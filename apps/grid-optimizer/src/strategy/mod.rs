//! Reference z-score strategy behind [`crate::application::ports::BacktestPort`].

pub mod metrics;
pub mod portfolio;
pub mod stats;
pub mod zscore;

pub use portfolio::{ClosedTrade, ExitReason, Portfolio};
pub use stats::{MovingStats, rolling_z_scores};
pub use zscore::{ZScoreBacktest, ZScoreBacktestConfig};
