//! Application Ports (Driven)
//!
//! Outbound interfaces used by the engine. Adapters live under
//! `infrastructure` and `strategy`.

mod backtest_port;
mod market_data_port;
mod result_sink_port;

pub use backtest_port::{BacktestInputs, BacktestPort, ComputeError};
pub use market_data_port::{MarketDataError, MarketDataPort};
pub use result_sink_port::{NoOpResultSink, ResultSinkPort, SinkError};
