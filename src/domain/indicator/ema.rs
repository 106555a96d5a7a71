//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n prices, then
//! EMA <- (price - EMA) * k + EMA for every later price in order.
//! Warmup: first (n-1) bars are undefined.
//!
//! `EmaState` is the only place the recurrence is written down; batch and
//! streaming callers both go through it, so a value warmed over history and
//! then updated bar by bar is bit-identical to a batch computation.

use crate::domain::error::SignalbtError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::{OhlcvBar, closes};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaState {
    period: usize,
    multiplier: f64,
    value: f64,
}

impl EmaState {
    /// Seed from the first `period` prices of `prices` (their SMA).
    pub fn seed(prices: &[f64], period: usize) -> Result<Self, SignalbtError> {
        if period == 0 {
            return Err(SignalbtError::invalid_period("ema", period));
        }
        if prices.len() < period {
            return Err(SignalbtError::InsufficientData {
                needed: period,
                got: prices.len(),
            });
        }
        let seed = prices[..period].iter().sum::<f64>() / period as f64;
        Ok(EmaState {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            value: seed,
        })
    }

    /// Seed from the first `period` prices, then fold the rest.
    pub fn warm(prices: &[f64], period: usize) -> Result<Self, SignalbtError> {
        let mut state = Self::seed(prices, period)?;
        for &price in &prices[period..] {
            state.update(price);
        }
        Ok(state)
    }

    pub fn update(&mut self, price: f64) -> f64 {
        self.value = (price - self.value) * self.multiplier + self.value;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// EMA of `prices` after consuming all of them.
pub fn ema(prices: &[f64], period: usize) -> Result<f64, SignalbtError> {
    EmaState::warm(prices, period).map(|state| state.value())
}

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ema(period);
    let closes = closes(bars);

    let Ok(mut state) = EmaState::seed(&closes, period) else {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    };

    let mut values = Vec::with_capacity(bars.len());
    values.extend(std::iter::repeat_n(None, period - 1));
    values.push(Some(state.value()));
    for &close in &closes[period..] {
        values.push(Some(state.update(close)));
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                code: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
                market_cap: None,
            })
            .collect()
    }

    #[test]
    fn ema_seed_is_sma() {
        let value = ema(&[10.0, 20.0, 30.0], 3).unwrap();
        assert!((value - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_recursive_calculation() {
        let k = 2.0 / 4.0;
        let seed = 20.0;
        let e3 = (40.0 - seed) * k + seed;
        let e4 = (50.0 - e3) * k + e3;

        let value = ema(&[10.0, 20.0, 30.0, 40.0, 50.0], 3).unwrap();
        assert_eq!(value, e4);
    }

    #[test]
    fn ema_zero_period_is_invalid() {
        let err = ema(&[1.0, 2.0], 0).unwrap_err();
        assert!(matches!(err, SignalbtError::InvalidParameter { .. }));
    }

    #[test]
    fn ema_short_history_is_insufficient() {
        let err = ema(&[1.0, 2.0], 3).unwrap_err();
        assert!(matches!(
            err,
            SignalbtError::InsufficientData { needed: 3, got: 2 }
        ));
    }

    #[test]
    fn ema_equal_prices() {
        let value = ema(&[100.0; 10], 3).unwrap();
        assert!((value - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn series_warmup() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_ema(&bars, 3);

        assert_eq!(series.len(), 5);
        assert_eq!(series.value_at(0), None);
        assert_eq!(series.value_at(1), None);
        assert_eq!(series.value_at(2), Some(20.0));
        assert!(series.value_at(4).is_some());
    }

    #[test]
    fn series_period_1_tracks_price() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_ema(&bars, 1);
        assert_eq!(series.values, vec![Some(10.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn series_period_0_is_undefined() {
        let bars = make_bars(&[10.0, 20.0]);
        let series = calculate_ema(&bars, 0);
        assert_eq!(series.values, vec![None, None]);
        assert_eq!(series.indicator_type, IndicatorType::Ema(0));
    }

    #[test]
    fn streaming_update_continues_batch() {
        let history = [9.0, 9.5, 10.0, 10.25, 9.75, 10.5];
        let mut state = EmaState::warm(&history, 4).unwrap();
        let next = state.update(11.0);

        let mut all = history.to_vec();
        all.push(11.0);
        assert_eq!(next, ema(&all, 4).unwrap());
        assert_eq!(state.period(), 4);
    }

    proptest! {
        #[test]
        fn batch_equals_seed_then_fold(
            prices in proptest::collection::vec(1.0f64..100_000.0, 1..120),
            period in 1usize..30,
        ) {
            prop_assume!(prices.len() >= period);

            let mut folded = prices[..period].iter().sum::<f64>() / period as f64;
            let k = 2.0 / (period as f64 + 1.0);
            for &p in &prices[period..] {
                folded = (p - folded) * k + folded;
            }

            prop_assert_eq!(ema(&prices, period).unwrap(), folded);

            let series = calculate_ema(&make_bars(&prices), period);
            prop_assert_eq!(series.value_at(prices.len() - 1), Some(folded));
        }
    }
}
