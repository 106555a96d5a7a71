//! Daily candidate scan: names trading above their medium EMA without being
//! stretched far above the long one.

use tracing::debug;

use crate::domain::error::SignalbtError;
use crate::domain::indicator::ema;
use crate::domain::series::SymbolSeries;

/// Name fragments of funds, notes and SPACs, which are never candidates.
pub const DEFAULT_EXCLUDE_KEYWORDS: [&str; 12] = [
    "KODEX",
    "TIGER",
    "ARIRANG",
    "KBSTAR",
    "SMART",
    "선물",
    "인버스",
    "레버리지",
    "ETN",
    "ETF",
    "스팩",
    "SPAC",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Latest close must be at least this.
    pub min_price: f64,
    /// Closing under this EMA disqualifies.
    pub trend_ema: usize,
    /// Above this EMA, the close may be at most `max_above_long_pct` % over it.
    pub long_ema: usize,
    pub max_above_long_pct: f64,
    /// Candidates report the nearest of these.
    pub ema_periods: Vec<usize>,
    pub exclude_keywords: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            min_price: 1_000.0,
            trend_ema: 60,
            long_ema: 224,
            max_above_long_pct: 2.0,
            ema_periods: vec![60, 112, 224],
            exclude_keywords: DEFAULT_EXCLUDE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScanConfig {
    /// Bars needed for every EMA the scan reads.
    pub fn min_bars(&self) -> usize {
        self.ema_periods
            .iter()
            .copied()
            .chain([self.trend_ema, self.long_ema])
            .max()
            .unwrap_or(0)
    }

    fn excludes(&self, name: &str) -> bool {
        self.exclude_keywords.iter().any(|k| name.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub code: String,
    pub name: String,
    pub close: f64,
    pub nearest_period: usize,
    /// Signed (close - ema) / ema in percent, against the nearest EMA.
    pub distance_pct: f64,
    /// `(period, value)` for every configured EMA, in config order.
    pub emas: Vec<(usize, f64)>,
}

/// Signed distance of `price` from `ema` in percent; 0 for a zero EMA.
pub fn ema_distance_pct(price: f64, ema: f64) -> f64 {
    if ema == 0.0 {
        return 0.0;
    }
    (price - ema) / ema * 100.0
}

/// The `(period, value)` entry closest to `price`. Ties keep the earlier one.
pub fn nearest_ema(price: f64, emas: &[(usize, f64)]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for &(period, value) in emas {
        let closer = best.is_none_or(|(_, b)| {
            ema_distance_pct(price, value).abs() < ema_distance_pct(price, b).abs()
        });
        if closer {
            best = Some((period, value));
        }
    }
    best
}

/// Evaluate the latest bar of `series`. `Ok(None)` means filtered out.
pub fn scan_symbol(
    series: &SymbolSeries,
    name: &str,
    cfg: &ScanConfig,
) -> Result<Option<Candidate>, SignalbtError> {
    if cfg.excludes(name) {
        return Ok(None);
    }
    let Some(last) = series.bars.last() else {
        return Ok(None);
    };
    if series.len() < cfg.min_bars() || last.close < cfg.min_price {
        return Ok(None);
    }

    let closes = series.closes();
    let close = last.close;
    if close < ema(closes, cfg.trend_ema)? {
        return Ok(None);
    }
    let long = ema(closes, cfg.long_ema)?;
    if close > long && ema_distance_pct(close, long) > cfg.max_above_long_pct {
        return Ok(None);
    }

    let emas = cfg
        .ema_periods
        .iter()
        .map(|&p| ema(closes, p).map(|v| (p, v)))
        .collect::<Result<Vec<_>, _>>()?;
    let Some((nearest_period, nearest)) = nearest_ema(close, &emas) else {
        return Ok(None);
    };

    Ok(Some(Candidate {
        code: series.symbol.clone(),
        name: name.to_string(),
        close,
        nearest_period,
        distance_pct: ema_distance_pct(close, nearest),
        emas,
    }))
}

/// Scan every `(series, name)` pair, keeping input order. A symbol whose
/// evaluation fails is logged and skipped.
pub fn scan<'a, I>(universe: I, cfg: &ScanConfig) -> Vec<Candidate>
where
    I: IntoIterator<Item = (&'a SymbolSeries, &'a str)>,
{
    let mut candidates = Vec::new();
    for (series, name) in universe {
        match scan_symbol(series, name, cfg) {
            Ok(Some(candidate)) => candidates.push(candidate),
            Ok(None) => {}
            Err(e) => debug!(symbol = %series.symbol, error = %e, "scan skipped"),
        }
    }
    candidates
}
