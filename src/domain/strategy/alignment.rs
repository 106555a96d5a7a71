//! Moving-average alignment rule. Reads only the two bars before `index`.

use super::family::SignalRule;
use crate::domain::indicator::{DEFAULT_RSI_PERIOD, IndicatorType};
use crate::domain::series::SymbolSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageAlignment {
    pub fast: usize,
    pub mid: usize,
    pub slow: usize,
    pub trend: usize,
    pub rsi_period: usize,
    pub rsi_max: f64,
    pub exit_disparity_ma: usize,
    pub exit_disparity: f64,
    pub min_bars: usize,
}

impl Default for MovingAverageAlignment {
    fn default() -> Self {
        MovingAverageAlignment {
            fast: 3,
            mid: 6,
            slow: 19,
            trend: 60,
            rsi_period: DEFAULT_RSI_PERIOD,
            rsi_max: 70.0,
            exit_disparity_ma: 11,
            exit_disparity: 105.0,
            min_bars: 77,
        }
    }
}

impl SignalRule for MovingAverageAlignment {
    fn buy_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        if index < 2 || index + 1 < self.min_bars || index >= series.len() {
            return false;
        }
        let prev = &series.bars[index - 1];
        let prev_prev = &series.bars[index - 2];
        let p = index - 1;

        let (Some(fast), Some(mid), Some(slow), Some(trend), Some(trend_before)) = (
            series.sma(self.fast, p),
            series.sma(self.mid, p),
            series.sma(self.slow, p),
            series.sma(self.trend, p),
            series.sma(self.trend, p - 1),
        ) else {
            return false;
        };

        let above_all = [fast, mid, slow, trend].iter().all(|&ma| prev.close > ma);
        let trend_rising = trend_before < trend;
        let stacked = fast > mid && mid > slow;
        if !(above_all && trend_rising && stacked) {
            return false;
        }

        let (Some(rsi), Some(rsi_before)) = (
            series.rsi(self.rsi_period, p),
            series.rsi(self.rsi_period, p - 1),
        ) else {
            return false;
        };
        if rsi >= self.rsi_max || rsi_before >= rsi {
            return false;
        }

        prev_prev.volume < prev.volume && prev_prev.low < prev.low
    }

    /// Above `exit_disparity` on the short average, exit as soon as the prior
    /// close loses the fast SMA; otherwise only once it is under both the
    /// mid and slow SMAs.
    fn sell_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        if index < 1 || index + 1 <= self.slow || index >= series.len() {
            return false;
        }
        let p = index - 1;
        let close = series.bars[p].close;

        let Some(ma) = series.sma(self.exit_disparity_ma, p) else {
            return false;
        };
        if ma != 0.0 && close / ma * 100.0 > self.exit_disparity {
            series.sma(self.fast, p).is_some_and(|fast| close < fast)
        } else {
            match (series.sma(self.mid, p), series.sma(self.slow, p)) {
                (Some(mid), Some(slow)) => close < mid && close < slow,
                _ => false,
            }
        }
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Sma(self.fast),
            IndicatorType::Sma(self.mid),
            IndicatorType::Sma(self.slow),
            IndicatorType::Sma(self.trend),
            IndicatorType::Sma(self.exit_disparity_ma),
            IndicatorType::Rsi(self.rsi_period),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::NaiveDate;

    fn bar(i: usize, close: f64, low: f64, volume: i64) -> OhlcvBar {
        OhlcvBar {
            code: "252670".into(),
            date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap() + chrono::Duration::days(i as i64),
            open: close,
            high: close + 10.0,
            low,
            close,
            volume,
            market_cap: None,
        }
    }

    /// Slow drift up with a dip every third bar, so RSI sits between 0 and 100.
    fn uptrend(n: usize) -> Vec<OhlcvBar> {
        (0..n)
            .map(|i| {
                let base = 5_000.0 + i as f64 * 10.0;
                let close = if i % 3 == 2 { base - 15.0 } else { base };
                bar(i, close, close - 20.0, 1_000_000 + i as i64)
            })
            .collect()
    }

    #[test]
    fn needs_min_bars() {
        let rule = MovingAverageAlignment::default();
        let series = SymbolSeries::load("252670", uptrend(76)).unwrap();
        assert!(!rule.buy_signal(&series, 75));
    }

    #[test]
    fn rejects_when_prior_close_under_fast_sma() {
        let rule = MovingAverageAlignment::default();
        let series = SymbolSeries::load("252670", uptrend(82)).unwrap();
        // Bar 80 is a dip bar: its close equals its own SMA3, not above it.
        assert!(!rule.buy_signal(&series, 81));
    }

    #[test]
    fn sells_when_prior_close_breaks_mid_and_slow() {
        let rule = MovingAverageAlignment::default();
        let mut bars = uptrend(40);
        bars.push(bar(40, 4_800.0, 4_790.0, 1_000_000));
        bars.push(bar(41, 4_800.0, 4_790.0, 1_000_000));
        let series = SymbolSeries::load("252670", bars).unwrap();
        assert!(rule.sell_signal(&series, 41));
        assert!(!rule.sell_signal(&series, 40));
    }

    #[test]
    fn extended_move_exits_on_fast_sma() {
        let rule = MovingAverageAlignment::default();
        let mut bars: Vec<OhlcvBar> = (0..30).map(|i| bar(i, 5_000.0, 4_990.0, 1_000)).collect();
        // Spike well above SMA11, then a lower close still above SMA6/19.
        bars.push(bar(30, 6_000.0, 5_990.0, 1_000));
        bars.push(bar(31, 6_200.0, 6_190.0, 1_000));
        bars.push(bar(32, 5_900.0, 5_890.0, 1_000));
        bars.push(bar(33, 5_900.0, 5_890.0, 1_000));
        let series = SymbolSeries::load("252670", bars).unwrap();

        // Prior bar 32: SMA11 ~ 5_191 -> disparity > 105; SMA3 ~ 6_033 > 5_900.
        assert!(rule.sell_signal(&series, 33));
        // Prior bar 31 closed above its SMA3.
        assert!(!rule.sell_signal(&series, 32));
    }

    #[test]
    fn no_sell_on_short_history() {
        let rule = MovingAverageAlignment::default();
        let series = SymbolSeries::load("252670", uptrend(19)).unwrap();
        assert!(!rule.sell_signal(&series, 18));
    }
}
