//! Backtest engine and event loop.
//!
//! The engine knows nothing about trading rules. It walks the sorted union
//! of every loaded symbol's dates, hands each date to a strategy callback
//! that may call `Portfolio::buy`/`Portfolio::sell`, then marks positions to
//! that date's closes and records one equity snapshot.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::info;

use super::error::SignalbtError;
use super::indicator::IndicatorType;
use super::metrics::BacktestResult;
use super::ohlcv::OhlcvBar;
use super::portfolio::Portfolio;
use super::series::{SymbolSeries, build_unified_timeline};

pub const DEFAULT_INITIAL_CASH: f64 = 10_000_000.0;
pub const DEFAULT_COMMISSION_RATE: f64 = 0.0015;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub commission_rate: f64,
    /// Dates before this are still history, but are not simulated.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: DEFAULT_INITIAL_CASH,
            commission_rate: DEFAULT_COMMISSION_RATE,
            start_date: None,
            end_date: None,
        }
    }
}

/// What the strategy callback sees for one simulated date.
#[derive(Debug)]
pub struct MarketDay<'a> {
    pub date: NaiveDate,
    series: &'a BTreeMap<String, SymbolSeries>,
    today: BTreeMap<&'a str, usize>,
}

impl<'a> MarketDay<'a> {
    /// Symbols with a bar on this date, in symbol order.
    pub fn symbols(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.today.keys().copied()
    }

    pub fn bar(&self, symbol: &str) -> Option<&'a OhlcvBar> {
        let index = *self.today.get(symbol)?;
        self.series.get(symbol)?.bar(index)
    }

    pub fn bars(&self) -> impl Iterator<Item = (&'a str, &'a OhlcvBar)> + '_ {
        self.today
            .iter()
            .filter_map(|(&symbol, &i)| Some((symbol, self.series.get(symbol)?.bar(i)?)))
    }

    /// Index of this date's bar in the symbol's series.
    pub fn index(&self, symbol: &str) -> Option<usize> {
        self.today.get(symbol).copied()
    }

    /// The full series. Read only up to `index(symbol)` to avoid look-ahead.
    pub fn series(&self, symbol: &str) -> Option<&'a SymbolSeries> {
        self.series.get(symbol)
    }

    /// Bars up to and including this date (the latest earlier bar on a gap).
    pub fn history(&self, symbol: &str) -> &'a [OhlcvBar] {
        match self.series.get(symbol) {
            Some(s) => &s.bars[..s.bars_through(self.date)],
            None => &[],
        }
    }

    pub fn close_prices(&self) -> BTreeMap<String, f64> {
        self.bars()
            .map(|(symbol, bar)| (symbol.to_string(), bar.close))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Backtest {
    pub config: BacktestConfig,
    pub portfolio: Portfolio,
    series: BTreeMap<String, SymbolSeries>,
}

impl Backtest {
    pub fn new(config: BacktestConfig) -> Self {
        let portfolio = Portfolio::new(config.initial_cash, config.commission_rate);
        Backtest {
            config,
            portfolio,
            series: BTreeMap::new(),
        }
    }

    /// Register (or replace) the bar history for `symbol`.
    pub fn load_data(&mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Result<(), SignalbtError> {
        let series = SymbolSeries::load(symbol, bars)?;
        self.series.insert(symbol.to_string(), series);
        Ok(())
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn series(&self, symbol: &str) -> Option<&SymbolSeries> {
        self.series.get(symbol)
    }

    /// Precompute indicators for every loaded symbol.
    pub fn ensure_indicators(&mut self, types: &[IndicatorType]) {
        for series in self.series.values_mut() {
            series.ensure_indicators(types);
        }
    }

    /// Precompute indicators for one symbol. Unknown symbols are ignored.
    pub fn ensure_symbol_indicators(&mut self, symbol: &str, types: &[IndicatorType]) {
        if let Some(series) = self.series.get_mut(symbol) {
            series.ensure_indicators(types);
        }
    }

    pub fn run<F>(&mut self, mut strategy: F) -> Result<BacktestResult, SignalbtError>
    where
        F: FnMut(&mut Portfolio, &MarketDay),
    {
        if self.series.is_empty() {
            return Err(SignalbtError::NoData);
        }

        let timeline: Vec<NaiveDate> = build_unified_timeline(self.series.values())
            .into_iter()
            .filter(|d| self.config.start_date.is_none_or(|start| *d >= start))
            .filter(|d| self.config.end_date.is_none_or(|end| *d <= end))
            .collect();

        info!(
            symbols = self.series.len(),
            dates = timeline.len(),
            initial_cash = self.config.initial_cash,
            "backtest started"
        );

        for &date in &timeline {
            let today = self
                .series
                .iter()
                .filter_map(|(symbol, s)| s.index_of(date).map(|i| (symbol.as_str(), i)))
                .collect();
            let day = MarketDay {
                date,
                series: &self.series,
                today,
            };

            strategy(&mut self.portfolio, &day);
            let prices = day.close_prices();
            self.portfolio.update_positions(date, &prices);
        }

        let result = BacktestResult::from_portfolio(&self.portfolio);
        info!(
            final_equity = result.final_equity,
            total_return_pct = result.total_return_pct,
            max_drawdown_pct = result.max_drawdown_pct,
            trades = result.total_trades,
            "backtest finished"
        );
        Ok(result)
    }
}
