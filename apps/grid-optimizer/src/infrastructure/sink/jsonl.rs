//! Append-only JSON Lines result sink.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::PersistedResult;
use crate::application::ports::{ResultSinkPort, SinkError};
use crate::domain::{ParameterCombination, PerformanceMetrics};

/// Writes one JSON object per line.
///
/// Non-finite floats (e.g. a profit factor with no losing trades) are
/// written as `null`.
#[derive(Debug)]
pub struct JsonLinesResultSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesResultSink {
    /// Open `path` for appending, creating it and its parent directory.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| io_error(&path, &e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| io_error(&path, &e))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Destination path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> SinkError {
    SinkError::Io {
        message: format!("{}: {error}", path.display()),
    }
}

#[async_trait]
impl ResultSinkPort for JsonLinesResultSink {
    async fn persist(
        &self,
        run_id: &str,
        combination: &ParameterCombination,
        metrics: &PerformanceMetrics,
    ) -> Result<(), SinkError> {
        let record = PersistedResult::new(run_id, combination, metrics);
        let mut line = serde_json::to_vec(&record).map_err(|e| SinkError::Serialization {
            message: e.to_string(),
        })?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await.map_err(|e| io_error(&self.path, &e))?;
        file.flush().await.map_err(|e| io_error(&self.path, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SharedContext, TimeWindow};

    fn combination(threshold: f64) -> ParameterCombination {
        ParameterCombination {
            threshold,
            profit_percent: 4.0,
            stop_loss_percent: 2.0,
            moving_average: 50,
            context: SharedContext {
                base_asset: "ETH".to_string(),
                quote_asset: "USDT".to_string(),
                window: TimeWindow::new(0, 1_000),
            },
        }
    }

    #[tokio::test]
    async fn test_appends_one_line_per_result() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("temp dir should be created");
        };
        let path = dir.path().join("out").join("results.jsonl");

        let Ok(sink) = JsonLinesResultSink::open(&path).await else {
            panic!("sink should open");
        };
        for threshold in [1.0, 2.0] {
            let metrics = PerformanceMetrics {
                profit_factor: f64::INFINITY,
                ..Default::default()
            };
            let result = sink.persist("run-7", &combination(threshold), &metrics).await;
            assert!(result.is_ok());
        }

        let Ok(contents) = tokio::fs::read_to_string(&path).await else {
            panic!("results file should be readable");
        };
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let Ok(value) = serde_json::from_str::<serde_json::Value>(lines[1]) else {
            panic!("line should be valid JSON");
        };
        assert_eq!(value["run_id"], "run-7");
        assert_eq!(value["combination"]["threshold"], 2.0);
        assert!(value["metrics"]["profit_factor"].is_null());
    }
}
