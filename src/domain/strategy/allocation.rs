//! Momentum scores and the paired-weight tilt of the quadrant basket.

use std::collections::BTreeMap;

use crate::domain::backtest::MarketDay;
use crate::domain::error::SignalbtError;

/// Bars `momentum_score1` needs up to and including the scored bar.
pub const LONG_MOMENTUM_BARS: usize = 101;
/// Bars `momentum_score2` needs up to and including the scored bar.
pub const SHORT_MOMENTUM_BARS: usize = 21;

pub const DEFAULT_BOOST: f64 = 1.3;
pub const DEFAULT_CUT: f64 = 0.7;

fn pct_change(from: f64, to: f64) -> Result<f64, SignalbtError> {
    if from == 0.0 {
        return Err(SignalbtError::InvalidParameter {
            name: "close".into(),
            reason: "zero price in momentum window".into(),
        });
    }
    Ok((to - from) / from * 100.0)
}

fn check_window(closes: &[f64], index: usize, needed: usize) -> Result<(), SignalbtError> {
    let got = (index + 1).min(closes.len());
    if index >= closes.len() || got < needed {
        return Err(SignalbtError::InsufficientData { needed, got });
    }
    Ok(())
}

/// Long-horizon momentum: mean % change of `closes[index]` against the
/// closes 10, 20, ..., 100 bars back.
pub fn momentum_score1(closes: &[f64], index: usize) -> Result<f64, SignalbtError> {
    check_window(closes, index, LONG_MOMENTUM_BARS)?;
    let current = closes[index];
    let mut total = 0.0;
    for lag in (10..=100).step_by(10) {
        total += pct_change(closes[index - lag], current)?;
    }
    Ok(total / 10.0)
}

/// Short-horizon momentum: mean of the last 20 bar-to-bar % changes.
pub fn momentum_score2(closes: &[f64], index: usize) -> Result<f64, SignalbtError> {
    check_window(closes, index, SHORT_MOMENTUM_BARS)?;
    let window = &closes[index - 20..=index];
    let mut total = 0.0;
    for pair in window.windows(2) {
        total += pct_change(pair[0], pair[1])?;
    }
    Ok(total / 20.0)
}

/// `true` when both of `a`'s scores beat both of `b`'s.
fn leads(a1: f64, a2: f64, b1: f64, b2: f64) -> bool {
    a1 > b1 && a2 > b2
}

/// `(1.3, 0.7)` when `a` leads on both scores, `(0.7, 1.3)` otherwise.
pub fn weight_adjustment(a1: f64, a2: f64, b1: f64, b2: f64) -> (f64, f64) {
    if leads(a1, a2, b1, b2) {
        (DEFAULT_BOOST, DEFAULT_CUT)
    } else {
        (DEFAULT_CUT, DEFAULT_BOOST)
    }
}

/// Split `slice` between the pair in proportion to `adjustment`.
pub fn pair_weights(slice: f64, adjustment: (f64, f64)) -> Result<(f64, f64), SignalbtError> {
    let (wa, wb) = adjustment;
    let total = wa + wb;
    if wa < 0.0 || wb < 0.0 || total <= 0.0 {
        return Err(SignalbtError::InvalidParameter {
            name: "weights".into(),
            reason: format!("adjustment ({wa}, {wb}) must be non-negative with a positive sum"),
        });
    }
    Ok((slice * wa / total, slice * wb / total))
}

/// Target weights for a basket of one momentum-tilted pair plus fixed
/// members. Every member starts at `1 / n`; the pair's combined `2 / n`
/// is then split by the tilt.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadrantAllocator {
    pub pair: (String, String),
    pub fixed: Vec<String>,
    pub boost: f64,
    pub cut: f64,
}

impl QuadrantAllocator {
    pub fn new(pair_a: &str, pair_b: &str, fixed: &[&str]) -> Self {
        QuadrantAllocator {
            pair: (pair_a.to_string(), pair_b.to_string()),
            fixed: fixed.iter().map(|s| s.to_string()).collect(),
            boost: DEFAULT_BOOST,
            cut: DEFAULT_CUT,
        }
    }

    /// Pair first, then the fixed members in order.
    pub fn members(&self) -> Vec<&str> {
        let mut members = vec![self.pair.0.as_str(), self.pair.1.as_str()];
        members.extend(self.fixed.iter().map(String::as_str));
        members
    }

    pub fn equal_weights(&self) -> BTreeMap<String, f64> {
        let members = self.members();
        let each = 1.0 / members.len() as f64;
        members.into_iter().map(|m| (m.to_string(), each)).collect()
    }

    /// Weights from each pair member's closes, scored at their last bar.
    /// Falls back to equal weights while either score is undefined.
    pub fn weights_from_closes(&self, a: &[f64], b: &[f64]) -> BTreeMap<String, f64> {
        let mut weights = self.equal_weights();
        let Some(tilt) = self.tilt(a, b) else {
            return weights;
        };
        let slice = 2.0 / self.members().len() as f64;
        if let Ok((wa, wb)) = pair_weights(slice, tilt) {
            weights.insert(self.pair.0.clone(), wa);
            weights.insert(self.pair.1.clone(), wb);
        }
        weights
    }

    /// Weights for the pair's histories as of `day`.
    pub fn weights_at(&self, day: &MarketDay) -> BTreeMap<String, f64> {
        self.weights_from_closes(
            closes_through(day, &self.pair.0),
            closes_through(day, &self.pair.1),
        )
    }

    fn tilt(&self, a: &[f64], b: &[f64]) -> Option<(f64, f64)> {
        let (ia, ib) = (a.len().checked_sub(1)?, b.len().checked_sub(1)?);
        let a1 = momentum_score1(a, ia).ok()?;
        let a2 = momentum_score2(a, ia).ok()?;
        let b1 = momentum_score1(b, ib).ok()?;
        let b2 = momentum_score2(b, ib).ok()?;
        Some(if leads(a1, a2, b1, b2) {
            (self.boost, self.cut)
        } else {
            (self.cut, self.boost)
        })
    }
}

fn closes_through<'a>(day: &MarketDay<'a>, symbol: &str) -> &'a [f64] {
    match day.series(symbol) {
        Some(s) => &s.closes()[..s.bars_through(day.date)],
        None => &[],
    }
}
