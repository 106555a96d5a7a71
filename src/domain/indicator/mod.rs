//! Technical indicator implementations.
//!
//! Each indicator is available in two shapes:
//! - a point function over a price slice (`sma`, `ema`, `rsi`) that returns
//!   the value for the last price or fails with `InvalidParameter` /
//!   `InsufficientData`;
//! - a series function over bars (`calculate_*`) aligned 1:1 with the bars,
//!   where `None` marks a bar without enough history.

pub mod ema;
pub mod rsi;
pub mod sma;

pub use ema::{EmaState, calculate_ema, ema};
pub use rsi::{calculate_rsi, rsi};
pub use sma::{calculate_sma, sma};

use crate::domain::ohlcv::OhlcvBar;
use std::fmt;

pub const DEFAULT_RSI_PERIOD: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
}

impl IndicatorType {
    /// Number of bars needed before the first defined value.
    pub fn lookback(&self) -> usize {
        match self {
            IndicatorType::Sma(period) | IndicatorType::Ema(period) => *period,
            IndicatorType::Rsi(period) => period + 1,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn undefined(indicator_type: IndicatorType, len: usize) -> Self {
        IndicatorSeries {
            indicator_type,
            values: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`, `None` before warm-up or past the end.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

/// Compute the series for `indicator_type` over the closes of `bars`.
pub fn compute(bars: &[OhlcvBar], indicator_type: IndicatorType) -> IndicatorSeries {
    match indicator_type {
        IndicatorType::Sma(period) => calculate_sma(bars, period),
        IndicatorType::Ema(period) => calculate_ema(bars, period),
        IndicatorType::Rsi(period) => calculate_rsi(bars, period),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
        assert_eq!(IndicatorType::Ema(60).to_string(), "EMA(60)");
        assert_eq!(IndicatorType::Rsi(14).to_string(), "RSI(14)");
    }

    #[test]
    fn lookback_per_type() {
        assert_eq!(IndicatorType::Sma(20).lookback(), 20);
        assert_eq!(IndicatorType::Ema(60).lookback(), 60);
        assert_eq!(IndicatorType::Rsi(14).lookback(), 15);
    }

    #[test]
    fn value_at_distinguishes_warmup_from_zero() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Sma(2),
            values: vec![None, Some(0.0)],
        };
        assert_eq!(series.value_at(0), None);
        assert_eq!(series.value_at(1), Some(0.0));
        assert_eq!(series.value_at(2), None);
    }

    #[test]
    fn indicator_type_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(IndicatorType::Ema(20), "ema20");
        map.insert(IndicatorType::Ema(60), "ema60");
        map.insert(IndicatorType::Sma(20), "sma20");

        assert_eq!(map.get(&IndicatorType::Ema(20)), Some(&"ema20"));
        assert_eq!(map.get(&IndicatorType::Sma(20)), Some(&"sma20"));
        assert_eq!(map.get(&IndicatorType::Rsi(20)), None);
    }
}
