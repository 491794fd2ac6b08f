//! Market data adapters.

mod in_memory;
mod json_file;

pub use in_memory::InMemoryMarketData;
pub use json_file::JsonFileMarketData;
