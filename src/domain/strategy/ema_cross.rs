//! EMA golden cross / dead cross.

use super::family::SignalRule;
use crate::domain::indicator::IndicatorType;
use crate::domain::series::SymbolSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct EmaCross {
    pub fast: usize,
    pub slow: usize,
}

impl Default for EmaCross {
    fn default() -> Self {
        EmaCross { fast: 5, slow: 20 }
    }
}

impl EmaCross {
    /// `(fast - slow)` at `index - 1` and at `index`, once both EMAs are
    /// defined on both bars.
    fn spreads(&self, series: &SymbolSeries, index: usize) -> Option<(f64, f64)> {
        let prev = index.checked_sub(1)?;
        let before = series.ema(self.fast, prev)? - series.ema(self.slow, prev)?;
        let now = series.ema(self.fast, index)? - series.ema(self.slow, index)?;
        Some((before, now))
    }
}

impl SignalRule for EmaCross {
    fn buy_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        self.spreads(series, index)
            .is_some_and(|(before, now)| before <= 0.0 && now > 0.0)
    }

    fn sell_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        self.spreads(series, index)
            .is_some_and(|(before, now)| before >= 0.0 && now < 0.0)
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::Ema(self.fast), IndicatorType::Ema(self.slow)]
    }
}
