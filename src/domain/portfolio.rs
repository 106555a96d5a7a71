//! Cash, positions, trade ledger and equity curve.
//!
//! `buy`/`sell` report infeasible orders (not enough cash, no position,
//! selling more than is held) as `false` and leave every field untouched.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

use super::position::{Position, Trade, TradeAction};

/// Snapshot taken once per simulated date after mark-to-market.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub date: NaiveDate,
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub commission_rate: f64,
    pub positions: BTreeMap<String, Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<PortfolioState>,
}

impl Portfolio {
    pub fn new(initial_cash: f64, commission_rate: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            commission_rate,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn buy(&mut self, symbol: &str, quantity: i64, price: f64, date: NaiveDate) -> bool {
        if quantity <= 0 {
            return false;
        }
        let cost = quantity as f64 * price;
        let fee = cost * self.commission_rate;
        if self.cash < cost + fee {
            debug!(symbol, quantity, price, cash = self.cash, "buy rejected: insufficient cash");
            return false;
        }

        self.cash -= cost + fee;
        match self.positions.get_mut(symbol) {
            Some(pos) => {
                let total_qty = pos.quantity + quantity;
                pos.entry_price = (pos.quantity as f64 * pos.entry_price
                    + quantity as f64 * price)
                    / total_qty as f64;
                pos.quantity = total_qty;
                pos.current_price = price;
            }
            None => {
                self.positions.insert(
                    symbol.to_string(),
                    Position {
                        symbol: symbol.to_string(),
                        quantity,
                        entry_price: price,
                        entry_date: date,
                        current_price: price,
                    },
                );
            }
        }

        self.trades.push(Trade {
            date,
            symbol: symbol.to_string(),
            action: TradeAction::Buy,
            quantity,
            price,
            commission: fee,
            total_cost: cost + fee,
        });
        debug!(%date, symbol, quantity, price, fee, "buy");
        true
    }

    pub fn sell(&mut self, symbol: &str, quantity: i64, price: f64, date: NaiveDate) -> bool {
        if quantity <= 0 {
            return false;
        }
        let Some(pos) = self.positions.get_mut(symbol) else {
            debug!(symbol, "sell rejected: no position");
            return false;
        };
        if pos.quantity < quantity {
            debug!(
                symbol,
                held = pos.quantity,
                quantity,
                "sell rejected: quantity exceeds holding"
            );
            return false;
        }

        let gross = quantity as f64 * price;
        let fee = gross * self.commission_rate;
        let proceeds = gross * (1.0 - self.commission_rate);
        self.cash += proceeds;

        pos.quantity -= quantity;
        pos.current_price = price;
        if pos.quantity == 0 {
            self.positions.remove(symbol);
        }

        self.trades.push(Trade {
            date,
            symbol: symbol.to_string(),
            action: TradeAction::Sell,
            quantity,
            price,
            commission: fee,
            total_cost: proceeds,
        });
        debug!(%date, symbol, quantity, price, fee, "sell");
        true
    }

    /// Sell the whole holding of `symbol`, if any.
    pub fn close_position(&mut self, symbol: &str, price: f64, date: NaiveDate) -> bool {
        match self.quantity_of(symbol) {
            0 => false,
            quantity => self.sell(symbol, quantity, price, date),
        }
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn quantity_of(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).map_or(0, |p| p.quantity)
    }

    /// Mark positions to `prices`, then append one equity snapshot.
    ///
    /// A symbol missing from `prices` keeps its last mark.
    pub fn update_positions(&mut self, date: NaiveDate, prices: &BTreeMap<String, f64>) {
        for (symbol, pos) in self.positions.iter_mut() {
            if let Some(&price) = prices.get(symbol) {
                pos.current_price = price;
            }
        }
        let equity = self.total_equity();
        self.equity_curve.push(PortfolioState {
            date,
            cash: self.cash,
            positions: self.positions.clone(),
            equity,
        });
    }

    /// cash + Σ quantity × current_price
    pub fn total_equity(&self) -> f64 {
        self.cash + self.positions.values().map(Position::value).sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(100_000.0, 0.0015);
        assert!((portfolio.cash - 100_000.0).abs() < f64::EPSILON);
        assert!(portfolio.positions.is_empty());
        assert!(portfolio.trades.is_empty());
        assert!(portfolio.equity_curve.is_empty());
    }

    #[test]
    fn buy_debits_cost_and_fee() {
        let mut portfolio = Portfolio::new(100_000.0, 0.001);
        assert!(portfolio.buy("A", 100, 50.0, day(1)));

        assert!((portfolio.cash - (100_000.0 - 5000.0 - 5.0)).abs() < 1e-9);
        let trade = &portfolio.trades[0];
        assert_eq!(trade.action, TradeAction::Buy);
        assert!((trade.commission - 5.0).abs() < 1e-9);
        assert!((trade.total_cost - 5005.0).abs() < 1e-9);
        assert_eq!(portfolio.quantity_of("A"), 100);
    }

    #[test]
    fn buy_rejected_without_cash() {
        let mut portfolio = Portfolio::new(1000.0, 0.01);
        // cost 1000 + fee 10 > cash
        assert!(!portfolio.buy("A", 10, 100.0, day(1)));
        assert!((portfolio.cash - 1000.0).abs() < f64::EPSILON);
        assert!(portfolio.positions.is_empty());
        assert!(portfolio.trades.is_empty());
    }

    #[test]
    fn buy_exactly_affordable() {
        let mut portfolio = Portfolio::new(1000.0, 0.0);
        assert!(portfolio.buy("A", 10, 100.0, day(1)));
        assert_eq!(portfolio.cash, 0.0);
    }

    #[test]
    fn second_buy_reaverages_entry() {
        let mut portfolio = Portfolio::new(1_000_000.0, 0.0);
        portfolio.buy("A", 100, 10.0, day(1));
        portfolio.buy("A", 300, 14.0, day(2));

        let pos = portfolio.get_position("A").unwrap();
        assert_eq!(pos.quantity, 400);
        assert_eq!(pos.entry_price, (100.0 * 10.0 + 300.0 * 14.0) / 400.0);
        assert_eq!(pos.entry_date, day(1));
        assert_eq!(pos.current_price, 14.0);
    }

    #[test]
    fn partial_sell_keeps_entry_price() {
        let mut portfolio = Portfolio::new(1_000_000.0, 0.0);
        portfolio.buy("A", 100, 10.0, day(1));
        assert!(portfolio.sell("A", 40, 12.0, day(2)));

        let pos = portfolio.get_position("A").unwrap();
        assert_eq!(pos.quantity, 60);
        assert_eq!(pos.entry_price, 10.0);
    }

    #[test]
    fn sell_credits_net_proceeds() {
        let mut portfolio = Portfolio::new(10_000.0, 0.01);
        portfolio.buy("A", 10, 100.0, day(1));
        let cash_after_buy = portfolio.cash;
        assert!(portfolio.sell("A", 10, 110.0, day(2)));

        assert!((portfolio.cash - (cash_after_buy + 1100.0 * 0.99)).abs() < 1e-9);
        assert!(!portfolio.has_position("A"));
        let trade = portfolio.trades.last().unwrap();
        assert_eq!(trade.action, TradeAction::Sell);
        assert!((trade.total_cost - 1089.0).abs() < 1e-9);
    }

    #[test]
    fn sell_failures_leave_state_unchanged() {
        let mut portfolio = Portfolio::new(10_000.0, 0.0);
        portfolio.buy("A", 10, 100.0, day(1));
        let before = portfolio.clone();

        assert!(!portfolio.sell("A", 11, 100.0, day(2)));
        assert!(!portfolio.sell("B", 1, 100.0, day(2)));
        assert_eq!(portfolio, before);
    }

    #[test]
    fn close_position_sells_everything() {
        let mut portfolio = Portfolio::new(10_000.0, 0.0);
        portfolio.buy("A", 10, 100.0, day(1));
        assert!(portfolio.close_position("A", 105.0, day(2)));
        assert!(!portfolio.close_position("A", 105.0, day(3)));
        assert!((portfolio.cash - 10_050.0).abs() < 1e-9);
    }

    #[test]
    fn update_positions_marks_and_snapshots() {
        let mut portfolio = Portfolio::new(10_000.0, 0.0);
        portfolio.buy("A", 10, 100.0, day(1));

        let mut prices = BTreeMap::new();
        prices.insert("A".to_string(), 120.0);
        portfolio.update_positions(day(1), &prices);

        let state = &portfolio.equity_curve[0];
        assert_eq!(state.date, day(1));
        assert!((state.cash - 9000.0).abs() < f64::EPSILON);
        assert!((state.equity - 10_200.0).abs() < f64::EPSILON);
        assert_eq!(state.positions["A"].current_price, 120.0);
    }

    #[test]
    fn update_positions_keeps_last_mark_on_gap() {
        let mut portfolio = Portfolio::new(10_000.0, 0.0);
        portfolio.buy("A", 10, 100.0, day(1));
        portfolio.update_positions(day(2), &BTreeMap::new());
        assert!((portfolio.equity_curve[0].equity - 10_000.0).abs() < f64::EPSILON);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Buy(usize, i64, f64),
        Sell(usize, i64, f64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 1i64..50, 1.0f64..200.0).prop_map(|(s, q, p)| Op::Buy(s, q, p)),
            (0usize..3, 1i64..50, 1.0f64..200.0).prop_map(|(s, q, p)| Op::Sell(s, q, p)),
        ]
    }

    proptest! {
        #[test]
        fn equity_identity_holds(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let symbols = ["A", "B", "C"];
            let mut portfolio = Portfolio::new(20_000.0, 0.0015);
            for (i, op) in ops.iter().enumerate() {
                let date = day(1) + chrono::Duration::days(i as i64);
                let mut prices = BTreeMap::new();
                match *op {
                    Op::Buy(s, q, p) => {
                        portfolio.buy(symbols[s], q, p, date);
                        prices.insert(symbols[s].to_string(), p);
                    }
                    Op::Sell(s, q, p) => {
                        portfolio.sell(symbols[s], q, p, date);
                        prices.insert(symbols[s].to_string(), p);
                    }
                }
                portfolio.update_positions(date, &prices);

                let state = portfolio.equity_curve.last().unwrap();
                let marked: f64 = state
                    .positions
                    .values()
                    .map(|p| p.quantity as f64 * p.current_price)
                    .sum();
                prop_assert!((state.equity - (state.cash + marked)).abs() < 1e-6);
                prop_assert!(portfolio.positions.values().all(|p| p.quantity > 0));
            }
        }
    }
}
