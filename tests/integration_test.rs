//! End-to-end engine scenarios against a mock data port.

mod common;

use approx::assert_relative_eq;
use common::*;
use signalbt::domain::backtest::{Backtest, BacktestConfig};
use signalbt::domain::error::SignalbtError;
use signalbt::domain::portfolio::Portfolio;
use signalbt::domain::series::SymbolSeries;
use signalbt::domain::strategy::{
    Action, ExitReason, QuadrantAllocator, RuleSetConfig, RuleSetRunner, StrategyState,
    momentum_score1, momentum_score2, sell_signal, step, weight_adjustment,
};
use signalbt::domain::universe::{SkipReason, validate_universe};
use signalbt::ports::data_port::DataPort;

fn zero_fee(cash: f64) -> BacktestConfig {
    BacktestConfig {
        initial_cash: cash,
        commission_rate: 0.0,
        ..BacktestConfig::default()
    }
}

mod end_to_end {
    use super::*;

    #[test]
    fn buy_then_sell_returns_two_percent() {
        let port =
            MockDataPort::new().with_bars("A", bars_from_closes("A", &[100.0, 110.0, 120.0]));
        let mut backtest = Backtest::new(zero_fee(1_000_000.0));
        backtest
            .load_data("A", port.fetch_ohlcv("A", None, None).unwrap())
            .unwrap();

        let result = backtest
            .run(|portfolio, market| {
                if market.date == day(0) {
                    assert!(portfolio.buy("A", 1_000, 100.0, market.date));
                } else if market.date == day(2) {
                    assert!(portfolio.sell("A", 1_000, 120.0, market.date));
                }
            })
            .unwrap();

        assert_relative_eq!(result.total_return_pct, 2.0, epsilon = 1e-12);
        assert_eq!(result.total_trades, 2);
        assert_relative_eq!(result.final_equity, 1_020_000.0);
    }

    #[test]
    fn all_in_drawdown_is_one_third() {
        let closes = [100.0, 120.0, 100.0, 80.0, 90.0];
        let mut backtest = Backtest::new(zero_fee(1_000_000.0));
        backtest.load_data("A", bars_from_closes("A", &closes)).unwrap();

        let result = backtest
            .run(|portfolio, market| {
                if market.date == day(0) {
                    assert!(portfolio.buy("A", 10_000, 100.0, market.date));
                }
            })
            .unwrap();

        let equities: Vec<f64> = result.equity_curve.iter().map(|s| s.equity).collect();
        assert_eq!(equities, vec![1_000_000.0, 1_200_000.0, 1_000_000.0, 800_000.0, 900_000.0]);
        assert_relative_eq!(result.max_drawdown_pct, 100.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn rule_set_round_trip_on_surge_and_break() {
        let mut backtest = Backtest::new(zero_fee(10_000_000.0));
        backtest.load_data("A", surge_then_break("A")).unwrap();
        let mut runner = RuleSetRunner::new(RuleSetConfig::default(), 1.0).unwrap();
        backtest.ensure_indicators(&runner.required_indicators());

        let result = backtest.run(|p, market| runner.on_day(p, market)).unwrap();

        assert_eq!(result.total_trades, 2);
        assert_eq!(result.trades[0].date, day(60));
        assert_eq!(result.trades[1].date, day(61));
        assert_relative_eq!(result.final_equity, 10_000_000.0 - 952.0 * 600.0);
        assert!(runner.book().is_empty());
    }
}

mod exit_priority {
    use super::*;

    /// The bar after entry closes under the entry open on more volume than
    /// the entry bar: rules 1 and 2 both hold.
    fn both_rules_true() -> (SymbolSeries, StrategyState) {
        let mut bars = surge_then_break("A");
        bars[61].volume = 6_000_000;
        let series = SymbolSeries::load("A", bars).unwrap();
        let state = StrategyState::enter(series.bar(60).unwrap(), 60, None);
        (series, state)
    }

    #[test]
    fn entry_open_stop_wins() {
        let (series, state) = both_rules_true();
        let cfg = RuleSetConfig::default();

        let (action, next) = step(&series, 61, Some(&state), &cfg).unwrap();
        assert_eq!(action, Action::Exit(ExitReason::BelowEntryOpen));
        assert_eq!(next, None);
    }

    #[test]
    fn volume_rule_only_fires_without_the_stop() {
        let (series, mut state) = both_rules_true();
        let cfg = RuleSetConfig {
            exit_below_entry_open: false,
            ..RuleSetConfig::default()
        };
        assert_eq!(
            sell_signal(&series, 61, &mut state, &cfg),
            Some(ExitReason::VolumeAboveEntry)
        );
    }

    #[test]
    fn runner_clears_state_after_exit() {
        let mut bars = surge_then_break("A");
        bars[61].volume = 6_000_000;
        let mut backtest = Backtest::new(zero_fee(10_000_000.0));
        backtest.load_data("A", bars).unwrap();
        let mut runner = RuleSetRunner::new(RuleSetConfig::default(), 1.0).unwrap();
        backtest.ensure_indicators(&runner.required_indicators());

        let result = backtest.run(|p, market| runner.on_day(p, market)).unwrap();
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[1].price, 9_900.0);
        assert!(!runner.book().is_holding("A"));
    }
}

mod portfolio_accounting {
    use super::*;

    #[test]
    fn failed_sell_changes_nothing() {
        let mut portfolio = Portfolio::new(100_000.0, 0.001);
        assert!(portfolio.buy("A", 10, 1_000.0, day(0)));
        let cash = portfolio.cash;
        let positions = portfolio.positions.clone();
        let trades = portfolio.trades.len();

        assert!(!portfolio.sell("A", 11, 1_000.0, day(1)));
        assert!(!portfolio.sell("B", 1, 1_000.0, day(1)));

        assert_eq!(portfolio.cash, cash);
        assert_eq!(portfolio.positions, positions);
        assert_eq!(portfolio.trades.len(), trades);
    }

    #[test]
    fn second_buy_re_averages_entry() {
        let mut portfolio = Portfolio::new(1_000_000.0, 0.0);
        assert!(portfolio.buy("A", 30, 100.0, day(0)));
        assert!(portfolio.buy("A", 70, 110.0, day(1)));
        let position = portfolio.get_position("A").unwrap();
        assert_eq!(position.quantity, 100);
        assert_eq!(position.entry_price, (30.0 * 100.0 + 70.0 * 110.0) / 100.0);
        assert_eq!(position.entry_date, day(0));
    }

    #[test]
    fn rejected_buy_for_insufficient_cash() {
        let mut portfolio = Portfolio::new(1_000.0, 0.0015);
        assert!(!portfolio.buy("A", 10, 100.0, day(0)));
        assert_eq!(portfolio.cash, 1_000.0);
        assert!(portfolio.trades.is_empty());
    }
}

mod allocation {
    use super::*;

    #[test]
    fn weight_pair_always_sums_to_two() {
        let cases = [
            (1.0, 1.0, 0.0, 0.0),
            (0.0, 0.0, 1.0, 1.0),
            (1.0, -1.0, 0.0, 0.0),
        ];
        for (a1, a2, b1, b2) in cases {
            let (wa, wb) = weight_adjustment(a1, a2, b1, b2);
            assert_eq!(wa + wb, 2.0);
        }
    }

    #[test]
    fn stronger_pair_member_gets_larger_slice() {
        let rising: Vec<f64> = (0..120).map(|i| 1_000.0 + 10.0 * i as f64).collect();
        let falling: Vec<f64> = (0..120).map(|i| 3_000.0 - 10.0 * i as f64).collect();
        assert!(momentum_score1(&rising, 119).unwrap() > momentum_score1(&falling, 119).unwrap());
        assert!(momentum_score2(&rising, 119).unwrap() > momentum_score2(&falling, 119).unwrap());

        let allocator = QuadrantAllocator::new("A", "B", &["C", "D"]);
        let weights = allocator.weights_from_closes(&rising, &falling);
        assert_relative_eq!(weights["A"], 0.5 * 1.3 / 2.0, epsilon = 1e-12);
        assert_relative_eq!(weights["B"], 0.5 * 0.7 / 2.0, epsilon = 1e-12);
        assert_relative_eq!(weights["C"], 0.25);
        assert_relative_eq!(weights.values().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn short_history_keeps_equal_weights() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let allocator = QuadrantAllocator::new("A", "B", &["C", "D"]);
        let weights = allocator.weights_from_closes(&closes, &closes);
        assert!(weights.values().all(|w| (w - 0.25).abs() < 1e-12));
    }

    #[test]
    fn momentum_needs_history() {
        let closes = vec![100.0; 50];
        assert!(matches!(
            momentum_score1(&closes, 49),
            Err(SignalbtError::InsufficientData { .. })
        ));
    }
}

mod universe {
    use super::*;

    #[test]
    fn partial_universe_proceeds() {
        let port = MockDataPort::new()
            .with_bars("A", bars_from_closes("A", &[1.0, 2.0, 3.0]))
            .with_bars("B", bars_from_closes("B", &[1.0]))
            .with_error("C", "connection refused");

        let result = validate_universe(
            &port,
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
            None,
            None,
            2,
        )
        .unwrap();

        assert_eq!(result.universe.symbols, vec!["A"]);
        let reasons: Vec<(&str, &SkipReason)> = result
            .skipped
            .iter()
            .map(|s| (s.symbol.as_str(), &s.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("B", &SkipReason::InsufficientBars { bars: 1 }),
                ("C", &SkipReason::NoData),
                ("D", &SkipReason::NoData),
            ]
        );
    }

    #[test]
    fn date_window_applies_to_fetch() {
        let port = MockDataPort::new().with_bars("A", bars_from_closes("A", &[1.0; 10]));
        let bars = port.fetch_ohlcv("A", Some(day(3)), Some(day(5))).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(port.get_data_range("A").unwrap(), Some((day(0), day(9), 10)));
    }
}
