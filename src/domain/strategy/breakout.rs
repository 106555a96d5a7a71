//! Volatility breakout.
//!
//! Buy when today's high reaches `open + prior_range * k`; sell when today's
//! low reaches `open - prior_range * k'`. With a trend EMA configured, `k`
//! and `k'` switch on whether the close sits above that EMA.

use super::family::SignalRule;
use crate::domain::indicator::IndicatorType;
use crate::domain::series::SymbolSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityBreakout {
    pub k_above: f64,
    pub k_below: f64,
    pub exit_k_above: f64,
    pub exit_k_below: f64,
    pub trend_ema: Option<usize>,
    /// Prior close above this SMA (of the prior bar) passes the base filter.
    pub filter_sma: usize,
    /// Open above the prior low also passes the base filter.
    pub open_above_prev_low: bool,
}

impl VolatilityBreakout {
    /// Trend-switched K (0.3 above EMA60, 0.4 below; mirrored on exit).
    pub fn trend_switched() -> Self {
        VolatilityBreakout {
            k_above: 0.3,
            k_below: 0.4,
            exit_k_above: 0.4,
            exit_k_below: 0.3,
            trend_ema: Some(60),
            filter_sma: 10,
            open_above_prev_low: true,
        }
    }

    /// Fixed K of 0.4 both ways, prior close above SMA20 as the only filter.
    pub fn fixed_k() -> Self {
        VolatilityBreakout {
            k_above: 0.4,
            k_below: 0.4,
            exit_k_above: 0.4,
            exit_k_below: 0.4,
            trend_ema: None,
            filter_sma: 20,
            open_above_prev_low: false,
        }
    }

    /// `Some(true)` when the close is above the trend EMA, `None` while the
    /// EMA is undefined. Without a trend EMA the close counts as above.
    fn above_trend(&self, series: &SymbolSeries, index: usize) -> Option<bool> {
        let close = series.bar(index)?.close;
        match self.trend_ema {
            Some(period) => series.ema(period, index).map(|ema| close > ema),
            None => Some(true),
        }
    }
}

impl SignalRule for VolatilityBreakout {
    fn buy_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        let min_bars = self.trend_ema.unwrap_or(0).max(self.filter_sma + 1);
        if index == 0 || index + 1 < min_bars {
            return false;
        }
        let (Some(bar), Some(prev)) = (series.bar(index), series.bar(index - 1)) else {
            return false;
        };

        let opened_above = self.open_above_prev_low && bar.open > prev.low;
        let closed_above = series
            .sma(self.filter_sma, index - 1)
            .is_some_and(|sma| prev.close > sma);
        if !(opened_above || closed_above) {
            return false;
        }

        let Some(above) = self.above_trend(series, index) else {
            return false;
        };
        let k = if above { self.k_above } else { self.k_below };
        bar.high >= bar.open + prev.range() * k
    }

    fn sell_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        if index == 0 {
            return false;
        }
        let (Some(bar), Some(prev)) = (series.bar(index), series.bar(index - 1)) else {
            return false;
        };
        let Some(above) = self.above_trend(series, index) else {
            return false;
        };
        let k = if above {
            self.exit_k_above
        } else {
            self.exit_k_below
        };
        bar.low <= bar.open - prev.range() * k
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        let mut types = vec![IndicatorType::Sma(self.filter_sma)];
        if let Some(period) = self.trend_ema {
            types.push(IndicatorType::Ema(period));
        }
        types
    }
}
