//! Configuration loading and validation.
//!
//! Every `load_*` function reads one INI section through [`ConfigPort`],
//! falls back to the built-in default for absent keys and rejects bad
//! values with the section and key that caused them. For optional gates an
//! empty value, `off` or `none` disables the gate.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::domain::backtest::{BacktestConfig, DEFAULT_COMMISSION_RATE, DEFAULT_INITIAL_CASH};
use crate::domain::error::SignalbtError;
use crate::domain::strategy::scanner::ScanConfig;
use crate::domain::strategy::{QuadrantAllocator, RuleFamily, RuleSetConfig};
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_POSITION_SIZE: f64 = 1.0;

/// The leveraged/inverse KOSDAQ pair, then the KOSPI leveraged and 2x
/// inverse funds, each with the rule family it trades.
pub const DEFAULT_QUADRANT: [(&str, &str); 4] = [
    ("233740", "breakout"),
    ("251340", "breakout_fixed"),
    ("122630", "disparity_rsi"),
    ("252670", "ma_alignment"),
];

/// Keys each section accepts.
pub const KNOWN_KEYS: [(&str, &[&str]); 4] = [
    (
        "backtest",
        &[
            "initial_cash",
            "commission_rate",
            "data_dir",
            "symbols",
            "symbol",
            "start_date",
            "end_date",
            "position_size",
        ],
    ),
    (
        "strategy",
        &[
            "min_price",
            "max_price",
            "require_bullish",
            "max_body_gain",
            "max_upper_tail_entry",
            "max_lower_tail_entry",
            "volume_ratio_min",
            "volume_ratio_max",
            "min_volume",
            "trend_emas",
            "aligned_emas",
            "deviation_ema",
            "max_ema_deviation",
            "min_market_cap",
            "exit_below_entry_open",
            "exit_on_volume_above_entry",
            "exit_sma_period",
            "max_upper_tail_exit",
            "hold_bars",
            "extend_volume_fraction",
        ],
    ),
    ("portfolio", &["pair_a", "pair_b", "fixed", "rules", "boost", "cut"]),
    (
        "scan",
        &[
            "min_price",
            "trend_ema",
            "long_ema",
            "max_above_long_pct",
            "ema_periods",
            "exclude_keywords",
            "names_file",
        ],
    ),
];

/// Load every section, discarding the values.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), SignalbtError> {
    load_backtest_config(config)?;
    load_position_size(config)?;
    load_rule_set_config(config)?;
    load_quadrant(config)?;
    load_scan_config(config)?;
    Ok(())
}

// ---- [backtest] ----

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SignalbtError> {
    const S: &str = "backtest";
    let initial_cash = number(config, S, "initial_cash")?.unwrap_or(DEFAULT_INITIAL_CASH);
    if initial_cash <= 0.0 {
        return Err(SignalbtError::config_invalid(S, "initial_cash", "must be positive"));
    }
    let commission_rate = number(config, S, "commission_rate")?.unwrap_or(DEFAULT_COMMISSION_RATE);
    if !(0.0..1.0).contains(&commission_rate) {
        return Err(SignalbtError::config_invalid(S, "commission_rate", "must be in [0, 1)"));
    }

    let start_date = date(config, S, "start_date")?;
    let end_date = date(config, S, "end_date")?;
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(SignalbtError::config_invalid(
                S,
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }

    Ok(BacktestConfig {
        initial_cash,
        commission_rate,
        start_date,
        end_date,
    })
}

pub fn load_position_size(config: &dyn ConfigPort) -> Result<f64, SignalbtError> {
    let value = number(config, "backtest", "position_size")?.unwrap_or(DEFAULT_POSITION_SIZE);
    if !(value > 0.0 && value <= 1.0) {
        return Err(SignalbtError::config_invalid("backtest", "position_size", "must be in (0, 1]"));
    }
    Ok(value)
}

/// `symbols` (comma list) or, failing that, `symbol`.
pub fn load_symbols(config: &dyn ConfigPort) -> Result<Vec<String>, SignalbtError> {
    for key in ["symbols", "symbol"] {
        if let Some(raw) = present(config, "backtest", key) {
            return parse_codes(&raw)
                .map_err(|e| SignalbtError::config_invalid("backtest", key, e.to_string()));
        }
    }
    Err(SignalbtError::ConfigMissing {
        section: "backtest".into(),
        key: "symbols".into(),
    })
}

pub fn load_data_dir(config: &dyn ConfigPort) -> Result<String, SignalbtError> {
    present(config, "backtest", "data_dir").ok_or(SignalbtError::ConfigMissing {
        section: "backtest".into(),
        key: "data_dir".into(),
    })
}

// ---- [strategy] ----

pub fn load_rule_set_config(config: &dyn ConfigPort) -> Result<RuleSetConfig, SignalbtError> {
    const S: &str = "strategy";
    let d = RuleSetConfig::default();

    let cfg = RuleSetConfig {
        min_price: gate(config, S, "min_price", d.min_price)?,
        max_price: gate(config, S, "max_price", d.max_price)?,
        require_bullish: flag(config, S, "require_bullish", d.require_bullish)?,
        max_body_gain: gate(config, S, "max_body_gain", d.max_body_gain)?,
        max_upper_tail_entry: gate(config, S, "max_upper_tail_entry", d.max_upper_tail_entry)?,
        max_lower_tail_entry: gate(config, S, "max_lower_tail_entry", d.max_lower_tail_entry)?,
        volume_ratio_min: gate(config, S, "volume_ratio_min", d.volume_ratio_min)?,
        volume_ratio_max: gate(config, S, "volume_ratio_max", d.volume_ratio_max)?,
        min_volume: gate(config, S, "min_volume", d.min_volume)?,
        trend_emas: match raw(config, S, "trend_emas") {
            None => d.trend_emas,
            Some(s) if is_off(&s) => Vec::new(),
            Some(s) => periods(S, "trend_emas", &s)?,
        },
        aligned_emas: match raw(config, S, "aligned_emas") {
            None => d.aligned_emas,
            Some(s) if is_off(&s) => None,
            Some(s) => match periods(S, "aligned_emas", &s)?.as_slice() {
                &[short, long] if short < long => Some((short, long)),
                _ => {
                    return Err(SignalbtError::config_invalid(
                        S,
                        "aligned_emas",
                        "expected two periods, short then long",
                    ));
                }
            },
        },
        deviation_ema: period(config, S, "deviation_ema")?.unwrap_or(d.deviation_ema),
        max_ema_deviation: gate(config, S, "max_ema_deviation", d.max_ema_deviation)?,
        min_market_cap: gate(config, S, "min_market_cap", d.min_market_cap)?,
        exit_below_entry_open: flag(config, S, "exit_below_entry_open", d.exit_below_entry_open)?,
        exit_on_volume_above_entry: flag(
            config,
            S,
            "exit_on_volume_above_entry",
            d.exit_on_volume_above_entry,
        )?,
        exit_sma_period: gate_period(config, S, "exit_sma_period", d.exit_sma_period)?,
        max_upper_tail_exit: gate(config, S, "max_upper_tail_exit", d.max_upper_tail_exit)?,
        hold_bars: gate_period(config, S, "hold_bars", d.hold_bars)?,
        extend_volume_fraction: gate(
            config,
            S,
            "extend_volume_fraction",
            d.extend_volume_fraction,
        )?,
    };

    let non_negative = [
        ("min_price", cfg.min_price),
        ("max_price", cfg.max_price),
        ("max_body_gain", cfg.max_body_gain),
        ("max_upper_tail_entry", cfg.max_upper_tail_entry),
        ("max_lower_tail_entry", cfg.max_lower_tail_entry),
        ("volume_ratio_min", cfg.volume_ratio_min),
        ("volume_ratio_max", cfg.volume_ratio_max),
        ("max_ema_deviation", cfg.max_ema_deviation),
        ("min_market_cap", cfg.min_market_cap),
        ("max_upper_tail_exit", cfg.max_upper_tail_exit),
        ("extend_volume_fraction", cfg.extend_volume_fraction),
    ];
    for (key, value) in non_negative {
        if value.is_some_and(|v| v < 0.0) {
            return Err(SignalbtError::config_invalid(S, key, "must not be negative"));
        }
    }
    if cfg.min_volume.is_some_and(|v| v < 0) {
        return Err(SignalbtError::config_invalid(S, "min_volume", "must not be negative"));
    }
    if let (Some(min), Some(max)) = (cfg.min_price, cfg.max_price) {
        if min >= max {
            return Err(SignalbtError::config_invalid(S, "max_price", "must exceed min_price"));
        }
    }
    if let (Some(min), Some(max)) = (cfg.volume_ratio_min, cfg.volume_ratio_max) {
        if min > max {
            return Err(SignalbtError::config_invalid(
                S,
                "volume_ratio_max",
                "must not be below volume_ratio_min",
            ));
        }
    }
    if cfg.extend_volume_fraction.is_some() && cfg.hold_bars.is_none() {
        return Err(SignalbtError::config_invalid(
            S,
            "extend_volume_fraction",
            "requires hold_bars",
        ));
    }
    Ok(cfg)
}

// ---- [portfolio] ----

/// The basket allocator and each member's rule family.
///
/// Without a `[portfolio]` pair the four-fund default basket is used.
pub fn load_quadrant(
    config: &dyn ConfigPort,
) -> Result<(QuadrantAllocator, BTreeMap<String, RuleFamily>), SignalbtError> {
    const S: &str = "portfolio";
    let mut allocator = match (present(config, S, "pair_a"), present(config, S, "pair_b")) {
        (None, None) => {
            let [a, b, c, d] = DEFAULT_QUADRANT.map(|(code, _)| code);
            QuadrantAllocator::new(a, b, &[c, d])
        }
        (Some(a), Some(b)) => {
            let fixed = match present(config, S, "fixed") {
                Some(list) => parse_codes(&list)
                    .map_err(|e| SignalbtError::config_invalid(S, "fixed", e.to_string()))?,
                None => Vec::new(),
            };
            let fixed: Vec<&str> = fixed.iter().map(String::as_str).collect();
            QuadrantAllocator::new(a.trim(), b.trim(), &fixed)
        }
        (Some(_), None) => {
            return Err(SignalbtError::ConfigMissing {
                section: S.into(),
                key: "pair_b".into(),
            });
        }
        (None, Some(_)) => {
            return Err(SignalbtError::ConfigMissing {
                section: S.into(),
                key: "pair_a".into(),
            });
        }
    };

    allocator.boost = number(config, S, "boost")?.unwrap_or(allocator.boost);
    allocator.cut = number(config, S, "cut")?.unwrap_or(allocator.cut);
    for (key, value) in [("boost", allocator.boost), ("cut", allocator.cut)] {
        if value <= 0.0 {
            return Err(SignalbtError::config_invalid(S, key, "must be positive"));
        }
    }

    let members = allocator.members();
    let mut unique = members.clone();
    unique.sort();
    unique.dedup();
    if unique.len() != members.len() {
        return Err(SignalbtError::config_invalid(S, "fixed", "basket members must be distinct"));
    }

    let mut rules = BTreeMap::new();
    match present(config, S, "rules") {
        Some(list) => {
            for entry in list.split(',') {
                let Some((symbol, family)) = entry.split_once(':') else {
                    return Err(SignalbtError::config_invalid(
                        S,
                        "rules",
                        format!("expected SYMBOL:FAMILY, got '{}'", entry.trim()),
                    ));
                };
                let family = RuleFamily::from_name(family)
                    .map_err(|e| SignalbtError::config_invalid(S, "rules", e.to_string()))?;
                rules.insert(symbol.trim().to_uppercase(), family);
            }
        }
        None => {
            for (code, family) in DEFAULT_QUADRANT {
                rules.insert(code.to_string(), RuleFamily::from_name(family)?);
            }
        }
    }
    if let Some(missing) = members.iter().find(|m| !rules.contains_key(**m)) {
        return Err(SignalbtError::config_invalid(
            S,
            "rules",
            format!("no rule family for basket member {missing}"),
        ));
    }
    rules.retain(|symbol, _| members.contains(&symbol.as_str()));

    Ok((allocator, rules))
}

// ---- [scan] ----

pub fn load_scan_config(config: &dyn ConfigPort) -> Result<ScanConfig, SignalbtError> {
    const S: &str = "scan";
    let d = ScanConfig::default();
    let cfg = ScanConfig {
        min_price: number(config, S, "min_price")?.unwrap_or(d.min_price),
        trend_ema: period(config, S, "trend_ema")?.unwrap_or(d.trend_ema),
        long_ema: period(config, S, "long_ema")?.unwrap_or(d.long_ema),
        max_above_long_pct: number(config, S, "max_above_long_pct")?
            .unwrap_or(d.max_above_long_pct),
        ema_periods: match present(config, S, "ema_periods") {
            Some(s) => periods(S, "ema_periods", &s)?,
            None => d.ema_periods,
        },
        exclude_keywords: match raw(config, S, "exclude_keywords") {
            None => d.exclude_keywords,
            Some(s) if is_off(&s) => Vec::new(),
            Some(s) => s
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect(),
        },
    };
    if cfg.min_price < 0.0 {
        return Err(SignalbtError::config_invalid(S, "min_price", "must not be negative"));
    }
    if cfg.max_above_long_pct < 0.0 {
        return Err(SignalbtError::config_invalid(S, "max_above_long_pct", "must not be negative"));
    }
    Ok(cfg)
}

/// Keys present in `section` that no loader reads.
pub fn unknown_keys<'a>(section: &str, keys: &'a [String]) -> Vec<&'a str> {
    let known = KNOWN_KEYS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
        .unwrap_or(&[]);
    keys.iter()
        .map(String::as_str)
        .filter(|k| !known.contains(k))
        .collect()
}

// ---- value helpers ----

fn raw(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config.get_string(section, key).map(|s| s.trim().to_string())
}

/// Set and non-empty.
fn present(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    raw(config, section, key).filter(|s| !s.is_empty())
}

fn is_off(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("off") || value.eq_ignore_ascii_case("none")
}

fn parse<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, SignalbtError> {
    value
        .replace('_', "")
        .parse()
        .map_err(|_| SignalbtError::config_invalid(section, key, format!("cannot parse '{value}'")))
}

fn number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, SignalbtError> {
    present(config, section, key)
        .map(|s| parse(section, key, &s))
        .transpose()
}

/// An optional threshold: absent keeps `default`, `off` disables.
fn gate<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Option<T>,
) -> Result<Option<T>, SignalbtError> {
    match raw(config, section, key) {
        None => Ok(default),
        Some(s) if is_off(&s) => Ok(None),
        Some(s) => parse(section, key, &s).map(Some),
    }
}

fn parse_period(section: &str, key: &str, value: &str) -> Result<usize, SignalbtError> {
    let period: usize = parse(section, key, value)?;
    if period == 0 {
        return Err(SignalbtError::config_invalid(section, key, "period must be positive"));
    }
    Ok(period)
}

fn period(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, SignalbtError> {
    present(config, section, key)
        .map(|s| parse_period(section, key, &s))
        .transpose()
}

fn gate_period(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Option<usize>,
) -> Result<Option<usize>, SignalbtError> {
    match raw(config, section, key) {
        None => Ok(default),
        Some(s) if is_off(&s) => Ok(None),
        Some(s) => parse_period(section, key, &s).map(Some),
    }
}

fn periods(section: &str, key: &str, value: &str) -> Result<Vec<usize>, SignalbtError> {
    value
        .split(',')
        .map(|p| parse_period(section, key, p.trim()))
        .collect()
}

fn flag(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, SignalbtError> {
    match raw(config, section, key) {
        None => Ok(default),
        Some(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(SignalbtError::config_invalid(
                section,
                key,
                format!("not a boolean: '{s}'"),
            )),
        },
    }
}

fn date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, SignalbtError> {
    present(config, section, key)
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
                SignalbtError::config_invalid(section, key, "expected YYYY-MM-DD")
            })
        })
        .transpose()
}
