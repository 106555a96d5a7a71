//! Open positions and the trade ledger record.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    /// Weighted-average cost across every buy since the position opened.
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub current_price: f64,
}

impl Position {
    pub fn value(&self) -> f64 {
        self.quantity as f64 * self.current_price
    }

    pub fn profit_loss(&self) -> f64 {
        (self.current_price - self.entry_price) * self.quantity as f64
    }

    pub fn profit_loss_pct(&self) -> f64 {
        if self.entry_price > 0.0 {
            (self.current_price - self.entry_price) / self.entry_price * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "buy"),
            TradeAction::Sell => write!(f, "sell"),
        }
    }
}

/// One accepted buy or sell.
///
/// `total_cost` is cash out for a buy (cost + commission) and cash in for a
/// sell (proceeds net of commission).
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub date: NaiveDate,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: i64,
    pub price: f64,
    pub commission: f64,
    pub total_cost: f64,
}
