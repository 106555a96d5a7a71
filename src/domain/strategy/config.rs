//! Thresholds of the volume-surge rule set.
//!
//! Every historical tuning is one value of [`RuleSetConfig`]; `None` turns an
//! optional gate or exit rule off.

use crate::domain::indicator::IndicatorType;

#[derive(Debug, Clone, PartialEq)]
pub struct RuleSetConfig {
    /// Close must be strictly above this.
    pub min_price: Option<f64>,
    /// Close must be strictly below this.
    pub max_price: Option<f64>,
    pub require_bullish: bool,
    /// Rejects bars whose (close - open) / open reaches this.
    pub max_body_gain: Option<f64>,
    pub max_upper_tail_entry: Option<f64>,
    pub max_lower_tail_entry: Option<f64>,
    /// Inclusive band for volume / previous volume.
    pub volume_ratio_min: Option<f64>,
    pub volume_ratio_max: Option<f64>,
    pub min_volume: Option<i64>,
    /// Close must be at or above each of these EMAs.
    pub trend_emas: Vec<usize>,
    /// (short, long): short EMA must not be below long EMA.
    pub aligned_emas: Option<(usize, usize)>,
    pub deviation_ema: usize,
    /// Rejects (close - EMA) / EMA at or above this.
    pub max_ema_deviation: Option<f64>,
    pub min_market_cap: Option<f64>,

    pub exit_below_entry_open: bool,
    pub exit_on_volume_above_entry: bool,
    pub exit_sma_period: Option<usize>,
    pub max_upper_tail_exit: Option<f64>,
    pub hold_bars: Option<usize>,
    pub extend_volume_fraction: Option<f64>,
}

impl Default for RuleSetConfig {
    fn default() -> Self {
        RuleSetConfig {
            min_price: Some(2_000.0),
            max_price: Some(300_000.0),
            require_bullish: true,
            max_body_gain: Some(0.22),
            max_upper_tail_entry: Some(0.05),
            max_lower_tail_entry: None,
            volume_ratio_min: Some(4.0),
            volume_ratio_max: Some(20.0),
            min_volume: Some(3_000_000),
            trend_emas: Vec::new(),
            aligned_emas: Some((20, 60)),
            deviation_ema: 20,
            max_ema_deviation: Some(0.20),
            min_market_cap: None,
            exit_below_entry_open: true,
            exit_on_volume_above_entry: true,
            exit_sma_period: Some(20),
            max_upper_tail_exit: Some(0.07),
            hold_bars: None,
            extend_volume_fraction: None,
        }
    }
}

impl RuleSetConfig {
    /// Adds a 3-bar holding deadline, pushed out by another 3 bars whenever
    /// volume reaches half of the entry bar's volume.
    pub fn holding_period_variant() -> Self {
        RuleSetConfig {
            hold_bars: Some(3),
            extend_volume_fraction: Some(0.5),
            ..Self::default()
        }
    }

    /// Same gates with the price floor lowered to 1,000.
    pub fn low_price_floor_variant() -> Self {
        RuleSetConfig {
            min_price: Some(1_000.0),
            ..Self::default()
        }
    }

    /// Every indicator the entry gates and exit rules read.
    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        let mut types: Vec<IndicatorType> = self
            .trend_emas
            .iter()
            .map(|&p| IndicatorType::Ema(p))
            .collect();
        if let Some((short, long)) = self.aligned_emas {
            types.push(IndicatorType::Ema(short));
            types.push(IndicatorType::Ema(long));
        }
        if self.max_ema_deviation.is_some() {
            types.push(IndicatorType::Ema(self.deviation_ema));
        }
        if let Some(period) = self.exit_sma_period {
            types.push(IndicatorType::Sma(period));
        }
        types.sort();
        types.dedup();
        types
    }
}
