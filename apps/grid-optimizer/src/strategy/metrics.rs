//! Performance metrics for a simulated portfolio.
//!
//! Returns are computed per equity sample. Sharpe and Sortino subtract a
//! 2% annual risk-free rate spread over 365.25 days and annualize by the
//! square root of 365.25.

use super::portfolio::Portfolio;
use crate::domain::{PerformanceMetrics, TimeWindow};

const DAYS_PER_YEAR: f64 = 365.25;
const MS_PER_YEAR: f64 = DAYS_PER_YEAR * 24.0 * 60.0 * 60.0 * 1000.0;
const ANNUAL_RISK_FREE_RATE: f64 = 0.02;

/// Calculate metrics for `portfolio` over `window`.
#[must_use]
pub fn calculate(portfolio: &Portfolio, window: TimeWindow) -> PerformanceMetrics {
    let curve = portfolio.equity_curve();
    let initial = portfolio.initial_cash();
    let Some(&(_, final_value)) = curve.last() else {
        return PerformanceMetrics::default();
    };
    if initial <= 0.0 {
        return PerformanceMetrics::default();
    }

    let total_return = (final_value - initial) / initial;
    let years = window.duration_ms() as f64 / MS_PER_YEAR;
    let annualized_return = if years > 0.0 {
        (final_value / initial).powf(1.0 / years) - 1.0
    } else {
        0.0
    };

    let returns = period_returns(curve);
    let (sharpe_ratio, sortino_ratio) = risk_ratios(&returns);
    let max_drawdown = max_drawdown(curve, initial);

    let trades = portfolio.trades();
    let total_trades = trades.len();
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    let win_ratio = if total_trades > 0 {
        winners as f64 / total_trades as f64
    } else {
        0.0
    };

    let gross_profit: f64 = trades
        .iter()
        .map(|t| t.profit_loss)
        .filter(|pl| *pl > 0.0)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .map(|t| t.profit_loss)
        .filter(|pl| *pl < 0.0)
        .map(f64::abs)
        .sum();
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let avg_trade_duration_hours = if total_trades > 0 {
        trades.iter().map(|t| t.holding_period_hours()).sum::<f64>() / total_trades as f64
    } else {
        0.0
    };

    PerformanceMetrics {
        total_return,
        annualized_return,
        sharpe_ratio,
        sortino_ratio,
        max_drawdown,
        win_ratio,
        total_trades,
        profit_factor,
        avg_trade_duration_hours,
    }
}

fn period_returns(curve: &[(i64, f64)]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|w| {
            let prev = w[0].1;
            if prev > 0.0 { (w[1].1 - prev) / prev } else { 0.0 }
        })
        .collect()
}

fn risk_ratios(returns: &[f64]) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let volatility = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();

    let risk_free = ANNUAL_RISK_FREE_RATE / DAYS_PER_YEAR;
    let annualizer = DAYS_PER_YEAR.sqrt();

    let sharpe = if volatility > 0.0 {
        (mean - risk_free) / volatility * annualizer
    } else {
        0.0
    };

    let below: Vec<f64> = returns.iter().copied().filter(|r| *r < mean).collect();
    let downside = if below.is_empty() {
        0.0
    } else {
        (below.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / below.len() as f64).sqrt()
    };
    let sortino = if downside > 0.0 {
        (mean - risk_free) / downside * annualizer
    } else {
        0.0
    };

    (sharpe, sortino)
}

fn max_drawdown(curve: &[(i64, f64)], initial: f64) -> f64 {
    let mut peak = initial;
    let mut worst = 0.0_f64;
    for &(_, value) in curve {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::portfolio::ExitReason;

    const YEAR_MS: i64 = 31_557_600_000;

    #[test]
    fn test_untouched_portfolio_is_flat() {
        let portfolio = Portfolio::new(10_000.0);
        let metrics = calculate(&portfolio, TimeWindow::new(0, YEAR_MS));
        assert!(metrics.total_return.abs() < f64::EPSILON);
        assert_eq!(metrics.total_trades, 0);
        assert!(metrics.profit_factor.abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_winner() {
        let mut portfolio = Portfolio::new(10_000.0);
        let _ = portfolio.open(100.0, 0, 1.0, 10.0, 5.0);
        portfolio.mark(3_600_000, 105.0);
        let _ = portfolio.close(110.0, 7_200_000, ExitReason::TakeProfit);
        portfolio.mark(7_200_000, 110.0);

        let metrics = calculate(&portfolio, TimeWindow::new(0, YEAR_MS));
        assert!((metrics.total_return - 0.1).abs() < 1e-9);
        assert!((metrics.annualized_return - 0.1).abs() < 1e-9);
        assert_eq!(metrics.total_trades, 1);
        assert!((metrics.win_ratio - 1.0).abs() < f64::EPSILON);
        assert!(metrics.profit_factor.is_infinite());
        assert!((metrics.avg_trade_duration_hours - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_from_peak() {
        let curve = vec![(0, 100.0), (1, 120.0), (2, 90.0), (3, 130.0)];
        assert!((max_drawdown(&curve, 100.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_constant_returns_have_no_ratio() {
        assert_eq!(risk_ratios(&[0.01, 0.01, 0.01]), (0.0, 0.0));
    }
}
