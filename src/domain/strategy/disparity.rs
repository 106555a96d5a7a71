//! Disparity + RSI rule.
//!
//! Disparity is `close / SMA * 100`; the rule only wants to be long while the
//! prior close sits outside the `[low_band, high_band]` band.

use super::family::SignalRule;
use crate::domain::indicator::{DEFAULT_RSI_PERIOD, IndicatorType};
use crate::domain::series::SymbolSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct DisparityRsi {
    pub ma_period: usize,
    pub low_band: f64,
    pub high_band: f64,
    pub rsi_period: usize,
    pub rsi_max: f64,
    /// Bars required before buying; holding with fewer sells.
    pub min_bars: usize,
}

impl Default for DisparityRsi {
    fn default() -> Self {
        DisparityRsi {
            ma_period: 20,
            low_band: 98.0,
            high_band: 106.0,
            rsi_period: DEFAULT_RSI_PERIOD,
            rsi_max: 80.0,
            min_bars: 22,
        }
    }
}

impl DisparityRsi {
    fn extreme_disparity(&self, series: &SymbolSeries, index: usize) -> bool {
        let (Some(bar), Some(sma)) = (series.bar(index), series.sma(self.ma_period, index)) else {
            return false;
        };
        if sma == 0.0 {
            return false;
        }
        let disparity = bar.close / sma * 100.0;
        disparity < self.low_band || disparity > self.high_band
    }

    fn rising_lows(series: &SymbolSeries, index: usize) -> bool {
        match (series.bar(index - 2), series.bar(index - 1)) {
            (Some(prev_prev), Some(prev)) => prev_prev.low < prev.low,
            _ => false,
        }
    }
}

impl SignalRule for DisparityRsi {
    fn buy_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        if index < 2 || index + 1 < self.min_bars || index >= series.len() {
            return false;
        }
        if !Self::rising_lows(series, index) {
            return false;
        }
        if !self.extreme_disparity(series, index - 1) {
            return false;
        }
        series
            .rsi(self.rsi_period, index - 1)
            .is_some_and(|rsi| rsi < self.rsi_max)
    }

    /// Holds while (lows rising or prior volume under the 3-bar mean before
    /// it) and the disparity is still extreme; sells otherwise.
    fn sell_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        if index < 4 || index + 1 < self.min_bars || index >= series.len() {
            return true;
        }

        let lows_rising = Self::rising_lows(series, index);
        let recent = &series.bars[index - 4..index - 1];
        let mean_volume =
            recent.iter().map(|b| b.volume as f64).sum::<f64>() / recent.len() as f64;
        let volume_shrinking = (series.bars[index - 1].volume as f64) < mean_volume;

        let hold = (lows_rising || volume_shrinking) && self.extreme_disparity(series, index - 1);
        !hold
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Sma(self.ma_period),
            IndicatorType::Rsi(self.rsi_period),
        ]
    }
}
