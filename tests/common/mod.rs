#![allow(dead_code)]

use chrono::NaiveDate;
use signalbt::domain::error::SignalbtError;
pub use signalbt::domain::ohlcv::OhlcvBar;
use signalbt::ports::data_port::DataPort;
use std::collections::HashMap;
use std::fmt::Write as _;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, SignalbtError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SignalbtError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| start_date.is_none_or(|s| b.date >= s))
                    .filter(|b| end_date.is_none_or(|e| b.date <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SignalbtError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Day `i` counted from 2024-01-01.
pub fn day(i: usize) -> NaiveDate {
    date(2024, 1, 1) + chrono::Duration::days(i as i64)
}

pub fn make_ohlcv(
    symbol: &str,
    i: usize,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
) -> OhlcvBar {
    OhlcvBar {
        code: symbol.to_string(),
        date: day(i),
        open,
        high,
        low,
        close,
        volume,
        market_cap: None,
    }
}

/// A bar with open, high, low and close all at `close`.
pub fn make_bar(symbol: &str, i: usize, close: f64) -> OhlcvBar {
    make_ohlcv(symbol, i, close, close, close, close, 1_000)
}

pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(symbol, i, close))
        .collect()
}

/// 60 flat bars at 10,000 on 1M volume, a 5x volume surge bar closing at
/// 10,500, then a bar closing at 9,900 under the surge bar's open.
pub fn surge_then_break(symbol: &str) -> Vec<OhlcvBar> {
    let mut bars: Vec<OhlcvBar> = (0..60)
        .map(|i| make_ohlcv(symbol, i, 10_000.0, 10_000.0, 10_000.0, 10_000.0, 1_000_000))
        .collect();
    bars.push(make_ohlcv(symbol, 60, 10_000.0, 10_550.0, 9_950.0, 10_500.0, 5_000_000));
    bars.push(make_ohlcv(symbol, 61, 10_400.0, 10_400.0, 9_800.0, 9_900.0, 2_000_000));
    bars
}

/// Render bars in the on-disk CSV layout.
pub fn to_csv(bars: &[OhlcvBar]) -> String {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            b.date, b.open, b.high, b.low, b.close, b.volume
        )
        .unwrap();
    }
    out
}
