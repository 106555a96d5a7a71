//! Named signal-rule families and the trait they share.

use super::alignment::MovingAverageAlignment;
use super::breakout::VolatilityBreakout;
use super::disparity::DisparityRsi;
use super::ema_cross::EmaCross;
use super::pullback::EmaPullback;
use crate::domain::error::SignalbtError;
use crate::domain::indicator::IndicatorType;
use crate::domain::series::SymbolSeries;

/// A stateless buy/sell rule evaluated at one bar of a series.
///
/// Implementations must only read bars at or before `index`, and must return
/// `false` (never panic) when the history is too short.
pub trait SignalRule {
    fn buy_signal(&self, series: &SymbolSeries, index: usize) -> bool;
    fn sell_signal(&self, series: &SymbolSeries, index: usize) -> bool;
    fn required_indicators(&self) -> Vec<IndicatorType>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleFamily {
    Breakout(VolatilityBreakout),
    DisparityRsi(DisparityRsi),
    Alignment(MovingAverageAlignment),
    Pullback(EmaPullback),
    Cross(EmaCross),
}

impl RuleFamily {
    pub const NAMES: [&'static str; 6] = [
        "breakout",
        "breakout_fixed",
        "disparity_rsi",
        "ma_alignment",
        "ema_pullback",
        "ema_cross",
    ];

    /// Look a family up by its config name, with default parameters.
    pub fn from_name(name: &str) -> Result<Self, SignalbtError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "breakout" => Ok(RuleFamily::Breakout(VolatilityBreakout::trend_switched())),
            "breakout_fixed" => Ok(RuleFamily::Breakout(VolatilityBreakout::fixed_k())),
            "disparity_rsi" => Ok(RuleFamily::DisparityRsi(DisparityRsi::default())),
            "ma_alignment" => Ok(RuleFamily::Alignment(MovingAverageAlignment::default())),
            "ema_pullback" => Ok(RuleFamily::Pullback(EmaPullback::default())),
            "ema_cross" => Ok(RuleFamily::Cross(EmaCross::default())),
            other => Err(SignalbtError::InvalidParameter {
                name: "rule".into(),
                reason: format!(
                    "unknown rule family '{other}' (expected one of: {})",
                    Self::NAMES.join(", ")
                ),
            }),
        }
    }

    fn rule(&self) -> &dyn SignalRule {
        match self {
            RuleFamily::Breakout(r) => r,
            RuleFamily::DisparityRsi(r) => r,
            RuleFamily::Alignment(r) => r,
            RuleFamily::Pullback(r) => r,
            RuleFamily::Cross(r) => r,
        }
    }
}

impl SignalRule for RuleFamily {
    fn buy_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        self.rule().buy_signal(series, index)
    }

    fn sell_signal(&self, series: &SymbolSeries, index: usize) -> bool {
        self.rule().sell_signal(series, index)
    }

    fn required_indicators(&self) -> Vec<IndicatorType> {
        self.rule().required_indicators()
    }
}
