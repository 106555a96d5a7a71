//! Trading rules: the configurable volume-surge rule set, the basket rule
//! families, allocation, the backtest callbacks and the daily scan.

pub mod alignment;
pub mod allocation;
pub mod breakout;
pub mod config;
pub mod disparity;
pub mod ema_cross;
pub mod family;
pub mod pullback;
pub mod runner;
pub mod scanner;
pub mod signal;
pub mod state;

pub use allocation::{
    QuadrantAllocator, momentum_score1, momentum_score2, pair_weights, weight_adjustment,
};
pub use config::RuleSetConfig;
pub use family::{RuleFamily, SignalRule};
pub use runner::{QuadrantRunner, RuleSetRunner};
pub use scanner::{Candidate, ScanConfig, scan, scan_symbol};
pub use signal::{Action, EntryDecision, EntryGate, ExitReason, buy_signal, sell_signal, step};
pub use state::{StrategyBook, StrategyState};
