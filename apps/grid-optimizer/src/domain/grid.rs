//! Parameter grid for grid search optimization.

use serde::{Deserialize, Serialize};

use super::parameters::{ParameterCombination, SharedContext};

/// A parameter grid over the three strategy axes plus moving-average length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterGrid {
    thresholds: Vec<f64>,
    profit_percents: Vec<f64>,
    stop_loss_percents: Vec<f64>,
    moving_averages: Vec<usize>,
    context: SharedContext,
}

impl ParameterGrid {
    /// Create a new parameter grid builder.
    #[must_use]
    pub fn builder(context: SharedContext) -> ParameterGridBuilder {
        ParameterGridBuilder::new(context)
    }

    /// Get the total number of parameter combinations.
    #[must_use]
    pub fn total_combinations(&self) -> usize {
        self.thresholds.len()
            * self.profit_percents.len()
            * self.stop_loss_percents.len()
            * self.moving_averages.len()
    }

    /// Check if grid is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_combinations() == 0
    }

    /// Shared context.
    #[must_use]
    pub const fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Distinct moving-average lengths in the grid.
    #[must_use]
    pub fn moving_averages(&self) -> &[usize] {
        &self.moving_averages
    }

    /// Generate all parameter combinations.
    ///
    /// Order is deterministic: moving average, then threshold, then profit,
    /// then stop loss.
    #[must_use]
    pub fn combinations(&self) -> Vec<ParameterCombination> {
        let mut result = Vec::with_capacity(self.total_combinations());

        for &moving_average in &self.moving_averages {
            for &threshold in &self.thresholds {
                for &profit_percent in &self.profit_percents {
                    for &stop_loss_percent in &self.stop_loss_percents {
                        result.push(ParameterCombination {
                            threshold,
                            profit_percent,
                            stop_loss_percent,
                            moving_average,
                            context: self.context.clone(),
                        });
                    }
                }
            }
        }

        result
    }
}

/// Builder for parameter grids.
#[derive(Debug)]
pub struct ParameterGridBuilder {
    thresholds: Vec<f64>,
    profit_percents: Vec<f64>,
    stop_loss_percents: Vec<f64>,
    moving_averages: Vec<usize>,
    context: SharedContext,
}

impl ParameterGridBuilder {
    /// Create a new builder.
    #[must_use]
    pub const fn new(context: SharedContext) -> Self {
        Self {
            thresholds: Vec::new(),
            profit_percents: Vec::new(),
            stop_loss_percents: Vec::new(),
            moving_averages: Vec::new(),
            context,
        }
    }

    /// Set z-score threshold values.
    #[must_use]
    pub fn thresholds(mut self, values: Vec<f64>) -> Self {
        self.thresholds = values;
        self
    }

    /// Set take-profit values (percent).
    #[must_use]
    pub fn profit_percents(mut self, values: Vec<f64>) -> Self {
        self.profit_percents = values;
        self
    }

    /// Set stop-loss values (percent).
    #[must_use]
    pub fn stop_loss_percents(mut self, values: Vec<f64>) -> Self {
        self.stop_loss_percents = values;
        self
    }

    /// Set moving-average lengths. Duplicates are dropped.
    #[must_use]
    pub fn moving_averages(mut self, mut values: Vec<usize>) -> Self {
        values.sort_unstable();
        values.dedup();
        self.moving_averages = values;
        self
    }

    /// Set threshold values from an inclusive range.
    #[must_use]
    pub fn threshold_range(self, start: f64, end: f64, step: f64) -> Self {
        self.thresholds(float_range(start, end, step))
    }

    /// Set take-profit values from an inclusive range.
    #[must_use]
    pub fn profit_range(self, start: f64, end: f64, step: f64) -> Self {
        self.profit_percents(float_range(start, end, step))
    }

    /// Set stop-loss values from an inclusive range.
    #[must_use]
    pub fn stop_loss_range(self, start: f64, end: f64, step: f64) -> Self {
        self.stop_loss_percents(float_range(start, end, step))
    }

    /// Build the parameter grid.
    #[must_use]
    pub fn build(self) -> ParameterGrid {
        ParameterGrid {
            thresholds: self.thresholds,
            profit_percents: self.profit_percents,
            stop_loss_percents: self.stop_loss_percents,
            moving_averages: self.moving_averages,
            context: self.context,
        }
    }
}

/// Inclusive float range. Values are computed by index to avoid drift.
#[must_use]
pub fn float_range(start: f64, end: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || end < start {
        return vec![start];
    }
    let steps = ((end - start) / step + 1e-9).floor() as usize;
    (0..=steps)
        .map(|i| {
            let value = start + step * i as f64;
            (value * 1e9).round() / 1e9
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parameters::TimeWindow;

    fn context() -> SharedContext {
        SharedContext {
            base_asset: "ETH".to_string(),
            quote_asset: "USDT".to_string(),
            window: TimeWindow::new(0, 1_000),
        }
    }

    #[test]
    fn test_parameter_grid_builder() {
        let grid = ParameterGrid::builder(context())
            .thresholds(vec![1.0, 1.5, 2.0])
            .profit_percents(vec![5.0, 10.0])
            .stop_loss_percents(vec![2.0])
            .moving_averages(vec![20])
            .build();

        assert_eq!(grid.total_combinations(), 6);
        assert_eq!(grid.combinations().len(), 6);
    }

    #[test]
    fn test_parameter_grid_combinations_cover_all_pairs() {
        let grid = ParameterGrid::builder(context())
            .thresholds(vec![1.0, 2.0])
            .profit_percents(vec![5.0, 10.0])
            .stop_loss_percents(vec![1.0])
            .moving_averages(vec![50, 20, 50])
            .build();

        let combos = grid.combinations();
        assert_eq!(grid.moving_averages(), &[20, 50]);
        assert_eq!(combos.len(), 8);
        assert!(combos.iter().any(|c| c.threshold == 2.0
            && c.profit_percent == 10.0
            && c.moving_average == 50));
    }

    #[test]
    fn test_empty_axis_makes_grid_empty() {
        let grid = ParameterGrid::builder(context())
            .thresholds(vec![1.0])
            .moving_averages(vec![20])
            .build();
        assert!(grid.is_empty());
        assert!(grid.combinations().is_empty());
    }

    #[test]
    fn test_float_range_is_inclusive() {
        assert_eq!(float_range(1.0, 2.0, 0.5), vec![1.0, 1.5, 2.0]);
        assert_eq!(float_range(0.1, 0.3, 0.1), vec![0.1, 0.2, 0.3]);
        assert_eq!(float_range(3.0, 1.0, 1.0), vec![3.0]);
    }
}
