//! OHLCV bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub market_cap: Option<f64>,
}

impl OhlcvBar {
    /// close > open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// (high - close) / high, 0 when high is not positive.
    pub fn upper_tail_ratio(&self) -> f64 {
        if self.high > 0.0 {
            (self.high - self.close) / self.high
        } else {
            0.0
        }
    }

    /// (close - low) / close, 0 when close is not positive.
    pub fn lower_tail_ratio(&self) -> f64 {
        if self.close > 0.0 {
            (self.close - self.low) / self.close
        } else {
            0.0
        }
    }

    /// (close - open) / open, 0 when open is not positive.
    pub fn body_gain(&self) -> f64 {
        if self.open > 0.0 {
            (self.close - self.open) / self.open
        } else {
            0.0
        }
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Closing prices of a bar slice, in order.
pub fn closes(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
