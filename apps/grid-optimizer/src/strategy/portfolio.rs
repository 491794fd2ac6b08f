//! Single-symbol long-only portfolio used by the z-score simulation.

use serde::{Deserialize, Serialize};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Z-score fell below the negative threshold.
    Signal,
    /// Take-profit price reached.
    TakeProfit,
    /// Stop-loss price reached.
    StopLoss,
}

/// A completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    /// Entry time (epoch ms).
    pub entry_time: i64,
    /// Exit time (epoch ms).
    pub exit_time: i64,
    /// Entry price.
    pub entry_price: f64,
    /// Exit price.
    pub exit_price: f64,
    /// Units held.
    pub quantity: f64,
    /// Realized profit or loss.
    pub profit_loss: f64,
    /// Exit reason.
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    /// Check if this trade was profitable.
    #[must_use]
    pub fn is_winner(&self) -> bool {
        self.profit_loss > 0.0
    }

    /// Holding period in hours.
    #[must_use]
    pub fn holding_period_hours(&self) -> f64 {
        (self.exit_time - self.entry_time).max(0) as f64 / MS_PER_HOUR
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenPosition {
    quantity: f64,
    entry_price: f64,
    entry_time: i64,
    stop_loss_price: f64,
    take_profit_price: f64,
}

/// Cash, at most one open position, equity curve and trade log.
#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_cash: f64,
    cash: f64,
    position: Option<OpenPosition>,
    equity_curve: Vec<(i64, f64)>,
    trades: Vec<ClosedTrade>,
}

impl Portfolio {
    /// Create a portfolio holding only cash.
    #[must_use]
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            position: None,
            equity_curve: vec![(0, initial_cash)],
            trades: Vec::new(),
        }
    }

    /// Starting cash.
    #[must_use]
    pub const fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    /// Available cash.
    #[must_use]
    pub const fn cash(&self) -> f64 {
        self.cash
    }

    /// Whether a position is open.
    #[must_use]
    pub const fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Equity samples as `(timestamp, value)`, starting with the initial cash.
    #[must_use]
    pub fn equity_curve(&self) -> &[(i64, f64)] {
        &self.equity_curve
    }

    /// Completed trades.
    #[must_use]
    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    /// Open a long position with `allocation` of available cash.
    ///
    /// Returns `false` when a position is already open or the price is not
    /// positive.
    pub fn open(
        &mut self,
        price: f64,
        timestamp: i64,
        allocation: f64,
        profit_percent: f64,
        stop_loss_percent: f64,
    ) -> bool {
        if self.position.is_some() || price <= 0.0 {
            return false;
        }
        let quantity = self.cash * allocation / price;
        if quantity <= 0.0 {
            return false;
        }

        self.cash -= quantity * price;
        self.position = Some(OpenPosition {
            quantity,
            entry_price: price,
            entry_time: timestamp,
            stop_loss_price: price * (1.0 - stop_loss_percent / 100.0),
            take_profit_price: price * (1.0 + profit_percent / 100.0),
        });
        true
    }

    /// Close the open position at `price`.
    pub fn close(&mut self, price: f64, timestamp: i64, reason: ExitReason) -> Option<&ClosedTrade> {
        let position = self.position.take()?;
        let proceeds = position.quantity * price;
        self.cash += proceeds;
        self.trades.push(ClosedTrade {
            entry_time: position.entry_time,
            exit_time: timestamp,
            entry_price: position.entry_price,
            exit_price: price,
            quantity: position.quantity,
            profit_loss: proceeds - position.quantity * position.entry_price,
            exit_reason: reason,
        });
        self.trades.last()
    }

    /// Exit reason triggered by `price`, stop-loss first.
    #[must_use]
    pub fn protective_exit(&self, price: f64) -> Option<ExitReason> {
        let position = self.position.as_ref()?;
        if price <= position.stop_loss_price {
            Some(ExitReason::StopLoss)
        } else if price >= position.take_profit_price {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }

    /// Cash plus the open position marked at `price`.
    #[must_use]
    pub fn value_at(&self, price: f64) -> f64 {
        self.cash + self.position.map_or(0.0, |p| p.quantity * price)
    }

    /// Append an equity sample marked at `price`.
    pub fn mark(&mut self, timestamp: i64, price: f64) {
        let value = self.value_at(price);
        self.equity_curve.push((timestamp, value));
    }
}
