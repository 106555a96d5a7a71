//! Run results and performance statistics.

use super::portfolio::{Portfolio, PortfolioState};
use super::position::{Trade, TradeAction};
use chrono::NaiveDate;
use std::collections::BTreeMap;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub total_trades: usize,
    pub equity_curve: Vec<PortfolioState>,
    pub trades: Vec<Trade>,
}

impl BacktestResult {
    pub fn from_portfolio(portfolio: &Portfolio) -> Self {
        let initial_equity = portfolio.initial_cash;
        let final_equity = portfolio
            .equity_curve
            .last()
            .map(|s| s.equity)
            .unwrap_or(portfolio.cash);

        let total_return_pct = if portfolio.equity_curve.is_empty() || initial_equity <= 0.0 {
            0.0
        } else {
            (final_equity - initial_equity) / initial_equity * 100.0
        };

        BacktestResult {
            initial_equity,
            final_equity,
            total_return_pct,
            max_drawdown_pct: max_drawdown_pct(&portfolio.equity_curve),
            total_trades: portfolio.trades.len(),
            equity_curve: portfolio.equity_curve.clone(),
            trades: portfolio.trades.clone(),
        }
    }
}

/// Largest peak-to-trough decline, in percent of the running peak.
pub fn max_drawdown_pct(equity_curve: &[PortfolioState]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    for state in equity_curve {
        if state.equity > peak {
            peak = state.equity;
        } else if peak > 0.0 {
            let dd = (peak - state.equity) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// One sell matched against the average cost of the shares it closed.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Net of commission on both legs.
    pub pnl: f64,
}

pub fn round_trips(trades: &[Trade]) -> Vec<RoundTrip> {
    struct Open {
        quantity: i64,
        cost: f64,
        entry_date: NaiveDate,
    }

    let mut open: BTreeMap<&str, Open> = BTreeMap::new();
    let mut trips = Vec::new();

    for trade in trades {
        match trade.action {
            TradeAction::Buy => {
                let entry = open.entry(trade.symbol.as_str()).or_insert(Open {
                    quantity: 0,
                    cost: 0.0,
                    entry_date: trade.date,
                });
                entry.quantity += trade.quantity;
                entry.cost += trade.total_cost;
            }
            TradeAction::Sell => {
                let Some(entry) = open.get_mut(trade.symbol.as_str()) else {
                    continue;
                };
                if entry.quantity <= 0 {
                    continue;
                }
                let allocated = entry.cost * trade.quantity as f64 / entry.quantity as f64;
                trips.push(RoundTrip {
                    symbol: trade.symbol.clone(),
                    entry_date: entry.entry_date,
                    exit_date: trade.date,
                    quantity: trade.quantity,
                    entry_price: allocated / trade.quantity as f64,
                    exit_price: trade.price,
                    pnl: trade.total_cost - allocated,
                });
                entry.quantity -= trade.quantity;
                entry.cost -= allocated;
                if entry.quantity <= 0 {
                    open.remove(trade.symbol.as_str());
                }
            }
        }
    }
    trips
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub round_trips: Vec<RoundTrip>,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
}

impl Summary {
    pub fn compute(result: &BacktestResult) -> Self {
        let round_trips = round_trips(&result.trades);

        let wins = round_trips.iter().filter(|t| t.pnl > 0.0).count();
        let losses = round_trips.iter().filter(|t| t.pnl < 0.0).count();
        let win_rate = if round_trips.is_empty() {
            0.0
        } else {
            wins as f64 / round_trips.len() as f64
        };

        let gross_win: f64 = round_trips.iter().map(|t| t.pnl).filter(|p| *p > 0.0).sum();
        let gross_loss: f64 = round_trips
            .iter()
            .map(|t| t.pnl)
            .filter(|p| *p < 0.0)
            .map(f64::abs)
            .sum();
        let profit_factor = if gross_loss > 0.0 {
            gross_win / gross_loss
        } else if gross_win > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Summary {
            total_pnl: round_trips.iter().map(|t| t.pnl).sum(),
            round_trips,
            wins,
            losses,
            win_rate,
            profit_factor,
            sharpe_ratio: sharpe_ratio(&result.equity_curve),
        }
    }
}

/// Annualised Sharpe ratio of daily equity returns, zero risk-free rate.
pub fn sharpe_ratio(equity_curve: &[PortfolioState]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}
