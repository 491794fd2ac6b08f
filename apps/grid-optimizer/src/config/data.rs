//! Market data and result sink configuration.

use serde::{Deserialize, Serialize};

/// Market data source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfig {
    /// JSON file holding `ratings` and `prices` arrays.
    #[serde(default = "default_data_path")]
    pub path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

/// Result sink backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Discard results.
    #[default]
    None,
    /// Keep results in memory.
    Memory,
    /// Append results to a JSON Lines file.
    JsonLines,
}

/// Result sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Backend.
    #[serde(default)]
    pub kind: SinkKind,
    /// Output path for file sinks.
    #[serde(default = "default_sink_path")]
    pub path: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            path: default_sink_path(),
        }
    }
}

fn default_data_path() -> String {
    "./data/market.json".to_string()
}

fn default_sink_path() -> String {
    "./data/results.jsonl".to_string()
}
