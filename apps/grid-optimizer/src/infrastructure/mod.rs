//! Infrastructure layer - adapters for the application ports.

pub mod market_data;
pub mod sink;

pub use market_data::{InMemoryMarketData, JsonFileMarketData};
pub use sink::{InMemoryResultSink, JsonLinesResultSink, PersistedResult};
