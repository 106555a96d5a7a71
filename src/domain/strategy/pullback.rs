//! EMA pullback: a bullish bar that dips back to a rising long EMA.

use super::family::SignalRule;
use crate::domain::indicator::IndicatorType;
use crate::domain::series::SymbolSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct EmaPullback {
    /// Checked in order; the first one that qualifies wins.
    pub periods: Vec<usize>,
    /// Max |close - ema| / ema, in percent.
    pub touch_pct: f64,
    /// The EMA must be higher than it was this many bars ago.
    pub slope_lookback: usize,
    /// Close must stay at or above this EMA to enter, and the position
    /// exits once it closes below.
    pub floor_ema: usize,
}

impl Default for EmaPullback {
    fn default() -> Self {
        EmaPullback {
            periods: vec![60, 112, 224],
            touch_pct: 1.0,
            slope_lookback: 4,
            floor_ema: 60,
        }
    }
}

impl EmaPullback {
    /// The EMA period the bar at `index` pulled back to, if any.
    pub fn entry_period(&self, series: &SymbolSeries, index: usize) -> Option<usize> {
        if index < self.slope_lookback.max(1) {
            return None;
        }
        let bar = series.bar(index)?;
        let prev = series.bar(index - 1)?;

        let floor = series.ema(self.floor_ema, index)?;
        if bar.close < floor || !bar.is_bullish() {
            return None;
        }

        self.periods.iter().copied().find(|&period| {
            let (Some(now), Some(before), Some(then)) = (
                series.ema(period, index),
                series.ema(period, index - 1),
                series.ema(period, index - self.slope_lookback),
            ) else {
                return false;
            };
            if now == 0.0 {
                return false;
            }
            let distance = (bar.close - now).abs() / now * 100.0;
            prev.close > before && distance <= self.touch_pct && now > then
        })
    }
}

impl SignalRule for EmaPullback {
    fn buy_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        self.entry_period(series, index).is_some()
    }

    fn sell_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        match (series.bar(index), series.ema(self.floor_ema, index)) {
            (Some(bar), Some(ema)) => bar.close < ema,
            _ => false,
        }
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        let mut types: Vec<IndicatorType> =
            self.periods.iter().map(|&p| IndicatorType::Ema(p)).collect();
        types.push(IndicatorType::Ema(self.floor_ema));
        types.sort();
        types.dedup();
        types
    }
}
