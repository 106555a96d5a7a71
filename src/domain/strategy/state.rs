//! Per-symbol state carried while a position is open.

use crate::domain::ohlcv::OhlcvBar;
use std::collections::BTreeMap;

/// Facts about the entry bar that exit rules refer back to.
///
/// Lives exactly as long as the position: created on entry, dropped on exit.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyState {
    pub entry_index: usize,
    pub entry_open: f64,
    pub entry_close: f64,
    pub entry_volume: i64,
    /// Bars after entry at which the holding period expires.
    pub hold_until: Option<usize>,
}

impl StrategyState {
    pub fn enter(bar: &OhlcvBar, index: usize, hold_bars: Option<usize>) -> Self {
        StrategyState {
            entry_index: index,
            entry_open: bar.open,
            entry_close: bar.close,
            entry_volume: bar.volume,
            hold_until: hold_bars,
        }
    }

    /// Bars elapsed since the entry bar.
    pub fn bars_held(&self, index: usize) -> usize {
        index.saturating_sub(self.entry_index)
    }
}

/// Open-position state for every symbol, owned by a runner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyBook {
    states: BTreeMap<String, StrategyState>,
}

impl StrategyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<&StrategyState> {
        self.states.get(symbol)
    }

    pub fn is_holding(&self, symbol: &str) -> bool {
        self.states.contains_key(symbol)
    }

    /// Store `state` for `symbol`, or clear it when `None`.
    pub fn set(&mut self, symbol: &str, state: Option<StrategyState>) {
        match state {
            Some(state) => {
                self.states.insert(symbol.to_string(), state);
            }
            None => {
                self.states.remove(symbol);
            }
        }
    }

    pub fn clear(&mut self, symbol: &str) -> Option<StrategyState> {
        self.states.remove(symbol)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry_bar() -> OhlcvBar {
        OhlcvBar {
            code: "A".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            open: 10_000.0,
            high: 10_600.0,
            low: 9_900.0,
            close: 10_500.0,
            volume: 5_000_000,
            market_cap: None,
        }
    }

    #[test]
    fn enter_records_entry_bar() {
        let state = StrategyState::enter(&entry_bar(), 42, Some(3));
        assert_eq!(state.entry_index, 42);
        assert_eq!(state.entry_open, 10_000.0);
        assert_eq!(state.entry_close, 10_500.0);
        assert_eq!(state.entry_volume, 5_000_000);
        assert_eq!(state.hold_until, Some(3));
        assert_eq!(state.bars_held(45), 3);
    }

    #[test]
    fn book_set_and_clear() {
        let mut book = StrategyBook::new();
        book.set("A", Some(StrategyState::enter(&entry_bar(), 0, None)));
        assert!(book.is_holding("A"));
        assert_eq!(book.len(), 1);

        book.set("A", None);
        assert!(!book.is_holding("A"));
        assert!(book.clear("A").is_none());
        assert!(book.is_empty());
    }
}
