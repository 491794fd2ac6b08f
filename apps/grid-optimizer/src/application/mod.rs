//! Application Layer
//!
//! Defines the ports through which the scheduling core talks to its external
//! collaborators: the backtest function, the market-data store, and the
//! result sink.

pub mod ports;

pub use ports::*;
