//! Parameter grid configuration.

use serde::{Deserialize, Serialize};

use crate::domain::{ParameterGrid, SharedContext, TimeWindow, float_range};

/// Values for one numeric axis: an explicit list or an inclusive range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisConfig {
    /// Explicit values.
    Values(Vec<f64>),
    /// `start..=end` in increments of `step`.
    Range {
        /// First value.
        start: f64,
        /// Last value (inclusive).
        end: f64,
        /// Increment.
        step: f64,
    },
}

impl AxisConfig {
    /// Expand into concrete values.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        match self {
            Self::Values(values) => values.clone(),
            Self::Range { start, end, step } => float_range(*start, *end, *step),
        }
    }

    fn step(&self) -> Option<f64> {
        match self {
            Self::Values(_) => None,
            Self::Range { step, .. } => Some(*step),
        }
    }
}

/// Grid search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Base asset.
    pub base_asset: String,
    /// Quote asset.
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Window start (epoch ms).
    pub start_time: i64,
    /// Window end (epoch ms).
    pub end_time: i64,
    /// Z-score thresholds.
    pub thresholds: AxisConfig,
    /// Take-profit percentages.
    pub profit_percents: AxisConfig,
    /// Stop-loss percentages.
    pub stop_loss_percents: AxisConfig,
    /// Moving-average lengths.
    #[serde(default = "default_moving_averages")]
    pub moving_averages: Vec<usize>,
    /// Ranked results kept in the report.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl GridConfig {
    /// Shared context for every combination.
    #[must_use]
    pub fn context(&self) -> SharedContext {
        SharedContext {
            base_asset: self.base_asset.clone(),
            quote_asset: self.quote_asset.clone(),
            window: TimeWindow::new(self.start_time, self.end_time),
        }
    }

    /// Build the parameter grid.
    #[must_use]
    pub fn to_grid(&self) -> ParameterGrid {
        ParameterGrid::builder(self.context())
            .thresholds(self.thresholds.values())
            .profit_percents(self.profit_percents.values())
            .stop_loss_percents(self.stop_loss_percents.values())
            .moving_averages(self.moving_averages.clone())
            .build()
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        if self.base_asset.trim().is_empty() {
            return Err("grid.base_asset must not be empty".to_string());
        }
        if self.end_time <= self.start_time {
            return Err("grid.end_time must be after grid.start_time".to_string());
        }
        for (name, axis) in [
            ("thresholds", &self.thresholds),
            ("profit_percents", &self.profit_percents),
            ("stop_loss_percents", &self.stop_loss_percents),
        ] {
            if axis.step().is_some_and(|step| step <= 0.0 || !step.is_finite()) {
                return Err(format!("grid.{name}.step must be positive"));
            }
        }
        Ok(())
    }
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_moving_averages() -> Vec<usize> {
    vec![20]
}

const fn default_top_n() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_accepts_list_or_range() {
        let Ok(list) = serde_yaml_bw::from_str::<AxisConfig>("[1.0, 2.0]") else {
            panic!("list should parse");
        };
        assert_eq!(list.values(), vec![1.0, 2.0]);

        let Ok(range) = serde_yaml_bw::from_str::<AxisConfig>("{start: 1.0, end: 2.0, step: 0.5}")
        else {
            panic!("range should parse");
        };
        assert_eq!(range.values(), vec![1.0, 1.5, 2.0]);
    }
}
