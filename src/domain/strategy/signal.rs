//! Entry gates and prioritised exit rules of the volume-surge rule set.
//!
//! Entry is a conjunction: every enabled gate must pass, and the first one
//! that fails is reported. Exit is a priority chain: the first rule that
//! fires wins and the rest are not looked at for that bar.

use std::fmt;
use tracing::debug;

use super::config::RuleSetConfig;
use super::state::StrategyState;
use crate::domain::error::SignalbtError;
use crate::domain::series::SymbolSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryGate {
    /// No previous bar, or an indicator the gates read is still undefined.
    Warmup,
    PriceBounds,
    NotBullish,
    BodyGain,
    NoPriorVolume,
    VolumeRatio,
    VolumeFloor,
    BelowTrendEma(usize),
    EmaMisaligned,
    EmaDeviation,
    UpperTail,
    LowerTail,
    MarketCap,
}

impl fmt::Display for EntryGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryGate::Warmup => write!(f, "warmup"),
            EntryGate::PriceBounds => write!(f, "price bounds"),
            EntryGate::NotBullish => write!(f, "not bullish"),
            EntryGate::BodyGain => write!(f, "body gain"),
            EntryGate::NoPriorVolume => write!(f, "no prior volume"),
            EntryGate::VolumeRatio => write!(f, "volume ratio"),
            EntryGate::VolumeFloor => write!(f, "volume floor"),
            EntryGate::BelowTrendEma(p) => write!(f, "below EMA({})", p),
            EntryGate::EmaMisaligned => write!(f, "EMA misaligned"),
            EntryGate::EmaDeviation => write!(f, "EMA deviation"),
            EntryGate::UpperTail => write!(f, "upper tail"),
            EntryGate::LowerTail => write!(f, "lower tail"),
            EntryGate::MarketCap => write!(f, "market cap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    Accepted,
    Rejected(EntryGate),
}

impl EntryDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, EntryDecision::Accepted)
    }
}

/// Exit rules in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExitReason {
    BelowEntryOpen,
    VolumeAboveEntry,
    BelowTrailingSma,
    LongUpperTail,
    HoldingPeriodExpired,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::BelowEntryOpen => write!(f, "close below entry open"),
            ExitReason::VolumeAboveEntry => write!(f, "volume above entry volume"),
            ExitReason::BelowTrailingSma => write!(f, "close below trailing SMA"),
            ExitReason::LongUpperTail => write!(f, "long upper tail"),
            ExitReason::HoldingPeriodExpired => write!(f, "holding period expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Hold,
    Enter,
    Exit(ExitReason),
}

macro_rules! gate {
    ($cond:expr, $gate:expr) => {
        if $cond {
            return Ok(EntryDecision::Rejected($gate));
        }
    };
}

/// Evaluate the entry gates on bar `index` of `series`.
pub fn buy_signal(
    series: &SymbolSeries,
    index: usize,
    cfg: &RuleSetConfig,
) -> Result<EntryDecision, SignalbtError> {
    let Some(bar) = series.bar(index) else {
        return Err(SignalbtError::InsufficientData {
            needed: index + 1,
            got: series.len(),
        });
    };
    let Some(prev) = index.checked_sub(1).and_then(|i| series.bar(i)) else {
        return Ok(EntryDecision::Rejected(EntryGate::Warmup));
    };
    let close = bar.close;

    gate!(
        cfg.min_price.is_some_and(|min| close <= min)
            || cfg.max_price.is_some_and(|max| close >= max),
        EntryGate::PriceBounds
    );
    gate!(cfg.require_bullish && !bar.is_bullish(), EntryGate::NotBullish);
    gate!(
        cfg.max_body_gain.is_some_and(|max| bar.body_gain() >= max),
        EntryGate::BodyGain
    );

    let volume_band = cfg.volume_ratio_min.is_some() || cfg.volume_ratio_max.is_some();
    if volume_band {
        gate!(prev.volume == 0, EntryGate::NoPriorVolume);
        let ratio = bar.volume as f64 / prev.volume as f64;
        gate!(
            cfg.volume_ratio_min.is_some_and(|min| ratio < min)
                || cfg.volume_ratio_max.is_some_and(|max| ratio > max),
            EntryGate::VolumeRatio
        );
    }
    gate!(
        cfg.min_volume.is_some_and(|min| bar.volume < min),
        EntryGate::VolumeFloor
    );

    for &period in &cfg.trend_emas {
        let Some(ema) = series.ema(period, index) else {
            return Ok(EntryDecision::Rejected(EntryGate::Warmup));
        };
        gate!(close < ema, EntryGate::BelowTrendEma(period));
    }

    if let Some((short, long)) = cfg.aligned_emas {
        let (Some(short_ema), Some(long_ema)) = (series.ema(short, index), series.ema(long, index))
        else {
            return Ok(EntryDecision::Rejected(EntryGate::Warmup));
        };
        gate!(short_ema < long_ema, EntryGate::EmaMisaligned);
    }

    if let Some(max_dev) = cfg.max_ema_deviation {
        let Some(ema) = series.ema(cfg.deviation_ema, index) else {
            return Ok(EntryDecision::Rejected(EntryGate::Warmup));
        };
        if ema > 0.0 {
            gate!((close - ema) / ema >= max_dev, EntryGate::EmaDeviation);
        }
    }

    gate!(
        cfg.max_upper_tail_entry
            .is_some_and(|max| bar.upper_tail_ratio() > max),
        EntryGate::UpperTail
    );
    gate!(
        cfg.max_lower_tail_entry
            .is_some_and(|max| bar.lower_tail_ratio() > max),
        EntryGate::LowerTail
    );
    gate!(
        cfg.min_market_cap
            .is_some_and(|min| bar.market_cap.is_none_or(|cap| cap < min)),
        EntryGate::MarketCap
    );

    Ok(EntryDecision::Accepted)
}

/// First exit rule that fires on bar `index`, if any.
///
/// Rule 5 may push `state.hold_until` out before checking for expiry.
pub fn sell_signal(
    series: &SymbolSeries,
    index: usize,
    state: &mut StrategyState,
    cfg: &RuleSetConfig,
) -> Option<ExitReason> {
    let bar = series.bar(index)?;

    if cfg.exit_below_entry_open && bar.close < state.entry_open {
        return Some(ExitReason::BelowEntryOpen);
    }
    if cfg.exit_on_volume_above_entry && bar.volume > state.entry_volume {
        return Some(ExitReason::VolumeAboveEntry);
    }
    let trailing_sma = cfg
        .exit_sma_period
        .and_then(|period| series.sma(period, index));
    if trailing_sma.is_some_and(|sma| bar.close < sma) {
        return Some(ExitReason::BelowTrailingSma);
    }
    if bar.is_bullish()
        && cfg
            .max_upper_tail_exit
            .is_some_and(|max| bar.upper_tail_ratio() > max)
    {
        return Some(ExitReason::LongUpperTail);
    }
    if let Some(base) = cfg.hold_bars {
        let mut deadline = state.hold_until.unwrap_or(base);
        let surge = cfg
            .extend_volume_fraction
            .is_some_and(|fraction| bar.volume as f64 >= fraction * state.entry_volume as f64);
        if surge {
            deadline += base;
        }
        state.hold_until = Some(deadline);
        if state.bars_held(index) >= deadline {
            return Some(ExitReason::HoldingPeriodExpired);
        }
    }
    None
}

/// One bar of the per-symbol state machine: `(action, next state)`.
///
/// The returned state is `None` whenever the symbol ends the bar flat.
pub fn step(
    series: &SymbolSeries,
    index: usize,
    state: Option<&StrategyState>,
    cfg: &RuleSetConfig,
) -> Result<(Action, Option<StrategyState>), SignalbtError> {
    match state {
        Some(state) => {
            let mut next = state.clone();
            match sell_signal(series, index, &mut next, cfg) {
                Some(reason) => {
                    debug!(symbol = %series.symbol, index, %reason, "exit rule fired");
                    Ok((Action::Exit(reason), None))
                }
                None => Ok((Action::Hold, Some(next))),
            }
        }
        None => match buy_signal(series, index, cfg)? {
            EntryDecision::Accepted => {
                let bar = series.bar(index).ok_or(SignalbtError::InsufficientData {
                    needed: index + 1,
                    got: series.len(),
                })?;
                let entered = StrategyState::enter(bar, index, cfg.hold_bars);
                Ok((Action::Enter, Some(entered)))
            }
            EntryDecision::Rejected(gate) => {
                debug!(symbol = %series.symbol, index, %gate, "entry rejected");
                Ok((Action::Hold, None))
            }
        },
    }
}
