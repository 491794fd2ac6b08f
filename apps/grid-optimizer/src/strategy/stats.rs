//! Rolling rating statistics.
//!
//! A z-score point at index `i` compares rating `i` against the population
//! mean and standard deviation of the `window` ratings before it.

use crate::domain::{RatingRecord, ZScorePoint};

/// Mean, population standard deviation and z-score of one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingStats {
    /// Window mean.
    pub mean: f64,
    /// Window population standard deviation.
    pub std_dev: f64,
    /// `(current - mean) / std_dev`, zero when the window is flat.
    pub z_score: f64,
}

impl MovingStats {
    /// Statistics of `current` against `window`.
    #[must_use]
    pub fn calculate(window: &[f64], current: f64) -> Self {
        if window.is_empty() {
            return Self {
                mean: current,
                std_dev: 0.0,
                z_score: 0.0,
            };
        }

        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        let z_score = if std_dev > 0.0 {
            (current - mean) / std_dev
        } else {
            0.0
        };

        Self {
            mean,
            std_dev,
            z_score,
        }
    }
}

/// Rolling z-score series over ratings sorted by timestamp.
///
/// Produces one point per rating after the first `window`; an empty series
/// when there are not enough ratings or `window` is zero.
#[must_use]
pub fn rolling_z_scores(ratings: &[RatingRecord], window: usize) -> Vec<ZScorePoint> {
    if window == 0 || ratings.len() <= window {
        return Vec::new();
    }

    let mut series: Vec<(i64, f64)> = ratings.iter().map(|r| (r.timestamp, r.rating)).collect();
    series.sort_by_key(|(timestamp, _)| *timestamp);
    let values: Vec<f64> = series.iter().map(|(_, rating)| *rating).collect();

    (window..series.len())
        .map(|end| {
            let stats = MovingStats::calculate(&values[end - window..end], values[end]);
            ZScorePoint {
                timestamp: series[end].0,
                mean: stats.mean,
                std_dev: stats.std_dev,
                z_score: stats.z_score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(timestamp: i64, value: f64) -> RatingRecord {
        RatingRecord {
            symbol: "BTCUSDT".to_string(),
            timestamp,
            rating: value,
            rating_deviation: 200.0,
            volatility: 0.06,
        }
    }

    #[test]
    fn test_moving_stats() {
        let stats = MovingStats::calculate(&[1.0, 2.0, 3.0, 4.0, 5.0], 6.0);
        assert!((stats.mean - 3.0).abs() < 1e-12);
        assert!((stats.std_dev - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((stats.z_score - 3.0 / 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_flat_window_has_zero_z() {
        let stats = MovingStats::calculate(&[5.0, 5.0, 5.0], 9.0);
        assert!(stats.std_dev.abs() < f64::EPSILON);
        assert!(stats.z_score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_rolling_series_sorts_and_skips_warmup() {
        let ratings = vec![
            rating(3_000, 1_520.0),
            rating(1_000, 1_500.0),
            rating(2_000, 1_510.0),
            rating(4_000, 1_600.0),
        ];
        let series = rolling_z_scores(&ratings, 2);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].timestamp, 3_000);
        assert_eq!(series[1].timestamp, 4_000);
        assert!(series[1].z_score > 0.0);
    }

    #[test]
    fn test_short_history_yields_nothing() {
        let ratings = vec![rating(1, 1.0), rating(2, 2.0)];
        assert!(rolling_z_scores(&ratings, 2).is_empty());
        assert!(rolling_z_scores(&ratings, 0).is_empty());
    }
}
