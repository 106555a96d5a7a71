//! Strategy callbacks that turn signals into portfolio orders.
//!
//! Both runners are driven by [`Backtest::run`](crate::domain::backtest::Backtest::run):
//! `on_day` is called once per simulated date with the portfolio and the
//! market view for that date.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::allocation::QuadrantAllocator;
use super::config::RuleSetConfig;
use super::family::{RuleFamily, SignalRule};
use super::signal::{Action, step};
use super::state::StrategyBook;
use crate::domain::backtest::MarketDay;
use crate::domain::error::SignalbtError;
use crate::domain::indicator::IndicatorType;
use crate::domain::portfolio::Portfolio;

/// Whole units affordable with `budget` at `price`, fee included.
fn affordable_quantity(budget: f64, price: f64, commission_rate: f64) -> i64 {
    if price <= 0.0 || budget <= 0.0 {
        return 0;
    }
    (budget / (price * (1.0 + commission_rate))).floor() as i64
}

/// Applies one [`RuleSetConfig`] to every symbol of the universe.
#[derive(Debug, Clone)]
pub struct RuleSetRunner {
    pub config: RuleSetConfig,
    /// Fraction of current cash committed per entry.
    pub position_size: f64,
    book: StrategyBook,
}

impl RuleSetRunner {
    pub fn new(config: RuleSetConfig, position_size: f64) -> Result<Self, SignalbtError> {
        if !(position_size > 0.0 && position_size <= 1.0) {
            return Err(SignalbtError::InvalidParameter {
                name: "position_size".into(),
                reason: format!("must be in (0, 1], got {position_size}"),
            });
        }
        Ok(RuleSetRunner {
            config,
            position_size,
            book: StrategyBook::new(),
        })
    }

    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        self.config.required_indicators()
    }

    pub fn book(&self) -> &StrategyBook {
        &self.book
    }

    pub fn on_day(&mut self, portfolio: &mut Portfolio, day: &MarketDay) {
        for symbol in day.symbols() {
            let (Some(series), Some(index)) = (day.series(symbol), day.index(symbol)) else {
                continue;
            };
            let Some(bar) = series.bar(index) else {
                continue;
            };

            let (action, next) = match step(series, index, self.book.get(symbol), &self.config) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(symbol, index, error = %e, "signal evaluation failed");
                    continue;
                }
            };

            match action {
                Action::Hold => self.book.set(symbol, next),
                Action::Enter => {
                    let budget = portfolio.cash * self.position_size;
                    let quantity =
                        affordable_quantity(budget, bar.close, portfolio.commission_rate);
                    if portfolio.buy(symbol, quantity, bar.close, day.date) {
                        self.book.set(symbol, next);
                    } else {
                        debug!(symbol, quantity, "entry signal not filled");
                    }
                }
                Action::Exit(reason) => {
                    portfolio.close_position(symbol, bar.close, day.date);
                    debug!(symbol, %reason, "position closed");
                    self.book.clear(symbol);
                }
            }
        }
    }
}

/// A fixed basket where each member trades its own rule family and is sized
/// by the allocator's weight of current equity.
#[derive(Debug, Clone)]
pub struct QuadrantRunner {
    pub allocator: QuadrantAllocator,
    rules: BTreeMap<String, RuleFamily>,
}

impl QuadrantRunner {
    /// Every allocator member needs a rule.
    pub fn new(
        allocator: QuadrantAllocator,
        rules: BTreeMap<String, RuleFamily>,
    ) -> Result<Self, SignalbtError> {
        if let Some(missing) = allocator.members().into_iter().find(|m| !rules.contains_key(*m)) {
            return Err(SignalbtError::InvalidParameter {
                name: "rules".into(),
                reason: format!("no rule family for basket member {missing}"),
            });
        }
        Ok(QuadrantRunner { allocator, rules })
    }

    pub fn rule(&self, symbol: &str) -> Option<&RuleFamily> {
        self.rules.get(symbol)
    }

    /// Indicators per member symbol.
    pub fn required_indicators(&self) -> BTreeMap<String, Vec<IndicatorType>> {
        self.rules
            .iter()
            .map(|(symbol, rule)| (symbol.clone(), rule.required_indicators()))
            .collect()
    }

    /// Exits first so freed cash is available to the day's entries.
    pub fn on_day(&self, portfolio: &mut Portfolio, day: &MarketDay) {
        let weights = self.allocator.weights_at(day);
        let equity = portfolio.total_equity();
        let mut exited = Vec::new();

        for (symbol, rule) in &self.rules {
            if !portfolio.has_position(symbol) {
                continue;
            }
            let (Some(series), Some(index)) = (day.series(symbol), day.index(symbol)) else {
                continue;
            };
            if rule.sell_signal(series, index) {
                if let Some(bar) = series.bar(index) {
                    portfolio.close_position(symbol, bar.close, day.date);
                    exited.push(symbol.as_str());
                }
            }
        }

        for (symbol, rule) in &self.rules {
            if portfolio.has_position(symbol) || exited.contains(&symbol.as_str()) {
                continue;
            }
            let (Some(series), Some(index)) = (day.series(symbol), day.index(symbol)) else {
                continue;
            };
            if !rule.buy_signal(series, index) {
                continue;
            }
            let Some(bar) = series.bar(index) else {
                continue;
            };
            let weight = weights.get(symbol).copied().unwrap_or(0.0);
            let budget = (weight * equity).min(portfolio.cash);
            let quantity = affordable_quantity(budget, bar.close, portfolio.commission_rate);
            if !portfolio.buy(symbol, quantity, bar.close, day.date) {
                debug!(symbol, weight, quantity, "basket entry not filled");
            }
        }
    }
}
