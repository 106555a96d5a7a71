//! Per-symbol bar history with an indicator cache, and the merged timeline.

use crate::domain::error::SignalbtError;
use crate::domain::indicator::{self, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::{self, OhlcvBar};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<OhlcvBar>,
    closes: Vec<f64>,
    date_index: HashMap<NaiveDate, usize>,
    indicators: HashMap<IndicatorType, IndicatorSeries>,
}

impl SymbolSeries {
    /// Wrap `bars` for `symbol`. Dates must be strictly increasing.
    pub fn load(symbol: &str, bars: Vec<OhlcvBar>) -> Result<Self, SignalbtError> {
        if bars.windows(2).any(|w| w[1].date <= w[0].date) {
            return Err(SignalbtError::UnsortedSeries {
                symbol: symbol.to_string(),
            });
        }
        let closes = ohlcv::closes(&bars);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Ok(Self {
            symbol: symbol.to_string(),
            bars,
            closes,
            date_index,
            indicators: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bar(&self, index: usize) -> Option<&OhlcvBar> {
        self.bars.get(index)
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Number of bars dated on or before `date`.
    pub fn bars_through(&self, date: NaiveDate) -> usize {
        self.bars.partition_point(|b| b.date <= date)
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    /// Compute and cache every requested indicator not cached yet.
    pub fn ensure_indicators(&mut self, types: &[IndicatorType]) {
        for &indicator_type in types {
            if !self.indicators.contains_key(&indicator_type) {
                let series = indicator::compute(&self.bars, indicator_type);
                self.indicators.insert(indicator_type, series);
            }
        }
    }

    pub fn cached(&self, indicator_type: IndicatorType) -> Option<&IndicatorSeries> {
        self.indicators.get(&indicator_type)
    }

    /// Indicator value at bar `index`, `None` during warm-up.
    ///
    /// Served from the cache when present, otherwise computed from the
    /// closes up to and including `index`.
    pub fn indicator(&self, indicator_type: IndicatorType, index: usize) -> Option<f64> {
        if let Some(series) = self.indicators.get(&indicator_type) {
            return series.value_at(index);
        }
        if index >= self.closes.len() {
            return None;
        }
        let prefix = &self.closes[..=index];
        match indicator_type {
            IndicatorType::Sma(period) => indicator::sma(prefix, period).ok(),
            IndicatorType::Ema(period) => indicator::ema(prefix, period).ok(),
            IndicatorType::Rsi(period) => indicator::rsi(prefix, period).ok(),
        }
    }

    pub fn sma(&self, period: usize, index: usize) -> Option<f64> {
        self.indicator(IndicatorType::Sma(period), index)
    }

    pub fn ema(&self, period: usize, index: usize) -> Option<f64> {
        self.indicator(IndicatorType::Ema(period), index)
    }

    pub fn rsi(&self, period: usize, index: usize) -> Option<f64> {
        self.indicator(IndicatorType::Rsi(period), index)
    }
}

/// Sorted union of every series' dates.
pub fn build_unified_timeline<'a, I>(series: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = &'a SymbolSeries>,
{
    let unique_dates: BTreeSet<NaiveDate> = series
        .into_iter()
        .flat_map(|s| s.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}
