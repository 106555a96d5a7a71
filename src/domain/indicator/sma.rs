//! Simple Moving Average.
//!
//! SMA(n) = mean of the last n closes. Warmup: first (n-1) bars are undefined.

use crate::domain::error::SignalbtError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::{OhlcvBar, closes};

/// Average of the last `period` prices.
pub fn sma(prices: &[f64], period: usize) -> Result<f64, SignalbtError> {
    if period == 0 {
        return Err(SignalbtError::invalid_period("sma", period));
    }
    if prices.len() < period {
        return Err(SignalbtError::InsufficientData {
            needed: period,
            got: prices.len(),
        });
    }
    let window = &prices[prices.len() - period..];
    Ok(window.iter().sum::<f64>() / period as f64)
}

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Sma(period);
    if period == 0 || bars.len() < period {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    }

    let closes = closes(bars);
    let mut values = vec![None; period - 1];
    // Summed per window so every point equals `sma` on the same prefix.
    values.extend(
        closes
            .windows(period)
            .map(|w| Some(w.iter().sum::<f64>() / period as f64)),
    );

    IndicatorSeries {
        indicator_type,
        values,
    }
}
