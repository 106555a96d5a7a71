//! RSI (Relative Strength Index).
//!
//! Plain averages over the most recent `n` price changes (no Wilder smoothing):
//! - avg_gain = sum of positive changes / n
//! - avg_loss = sum of |negative changes| / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100 (checked first, so a flat window is 100).
//! If avg_gain == 0: RSI = 0.
//!
//! Warmup: first n bars are undefined (n changes need n + 1 prices).

use crate::domain::error::SignalbtError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::{OhlcvBar, closes};

pub fn rsi(prices: &[f64], period: usize) -> Result<f64, SignalbtError> {
    if period == 0 {
        return Err(SignalbtError::invalid_period("rsi", period));
    }
    if prices.len() < period + 1 {
        return Err(SignalbtError::InsufficientData {
            needed: period + 1,
            got: prices.len(),
        });
    }

    let window = &prices[prices.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(gain, loss), delta| {
            if delta > 0.0 {
                (gain + delta, loss)
            } else {
                (gain, loss - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Ok(100.0);
    }
    if avg_gain == 0.0 {
        return Ok(0.0);
    }
    let rs = avg_gain / avg_loss;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

pub fn calculate_rsi(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Rsi(period);
    if period == 0 || bars.len() <= period {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    }

    let closes = closes(bars);
    let values = (0..closes.len())
        .map(|i| rsi(&closes[..=i], period).ok())
        .collect();

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
    fn rsi_all_gains() {
        let value = rsi(&[10.0, 11.0, 12.0, 13.0, 14.0], 4).unwrap();
        assert_eq!(value, 100.0);
    }

    #[test]
    fn rsi_all_losses() {
        let value = rsi(&[14.0, 13.0, 12.0, 11.0, 10.0], 4).unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn rsi_flat_series_resolves_to_100() {
        let value = rsi(&[50.0; 15], 14).unwrap();
        assert_eq!(value, 100.0);
    }

    #[test]
    fn rsi_mixed_changes() {
        // changes: +2, -1, +3, -2 -> avg_gain 5/4, avg_loss 3/4
        let value = rsi(&[10.0, 12.0, 11.0, 14.0, 12.0], 4).unwrap();
        let rs = 5.0 / 3.0;
        let expected = 100.0 - 100.0 / (1.0 + rs);
        assert!((value - expected).abs() < 1e-10);
    }

    #[test]
    fn rsi_only_last_period_changes_count() {
        // Early drop is outside the window of 2 changes.
        let value = rsi(&[100.0, 50.0, 51.0, 52.0], 2).unwrap();
        assert_eq!(value, 100.0);
    }

    #[test]
    fn rsi_needs_period_plus_one() {
        let err = rsi(&[1.0, 2.0, 3.0], 3).unwrap_err();
        assert!(matches!(
            err,
            SignalbtError::InsufficientData { needed: 4, got: 3 }
        ));
    }

    #[test]
    fn rsi_zero_period_is_invalid() {
        let err = rsi(&[1.0, 2.0], 0).unwrap_err();
        assert!(matches!(err, SignalbtError::InvalidParameter { .. }));
    }

    #[test]
    fn series_warmup() {
        let bars = make_bars(&[10.0, 11.0, 10.5, 12.0, 11.0]);
        let series = calculate_rsi(&bars, 3);

        assert_eq!(series.len(), 5);
        for i in 0..3 {
            assert_eq!(series.value_at(i), None, "bar {} should be warmup", i);
        }
        assert!(series.value_at(3).is_some());
        assert!(series.value_at(4).is_some());
    }

    #[test]
    fn series_too_short() {
        let bars = make_bars(&[10.0, 11.0]);
        let series = calculate_rsi(&bars, 3);
        assert_eq!(series.values, vec![None, None]);
    }

    proptest! {
        #[test]
        fn rsi_bounded(
            prices in proptest::collection::vec(1.0f64..1_000.0, 2..80),
            period in 1usize..20,
        ) {
            prop_assume!(prices.len() > period);
            let value = rsi(&prices, period).unwrap();
            prop_assert!((0.0..=100.0).contains(&value));
        }
    }
}
