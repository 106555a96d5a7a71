//! Symbol universe: parsing code lists from configuration and dropping
//! symbols without enough history to trade.

use crate::domain::error::SignalbtError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub symbols: Vec<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.symbols.len()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

/// Split a comma list of codes, trimming and uppercasing each one.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

#[derive(Debug)]
pub struct UniverseValidationResult {
    pub universe: Universe,
    pub skipped: Vec<SkippedSymbol>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

/// Keep the symbols with at least `min_bars` bars in the window.
///
/// Fails with `InsufficientData` when no symbol survives.
pub fn validate_universe(
    data_port: &dyn DataPort,
    symbols: Vec<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    min_bars: usize,
) -> Result<UniverseValidationResult, SignalbtError> {
    let mut valid = Vec::new();
    let mut skipped = Vec::new();

    for symbol in symbols {
        let bars = match data_port.fetch_ohlcv(&symbol, start_date, end_date) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(%symbol, error = %e, "skipping symbol");
                skipped.push(SkippedSymbol {
                    symbol,
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };

        if bars.is_empty() {
            warn!(%symbol, "skipping symbol: no data");
            skipped.push(SkippedSymbol {
                symbol,
                reason: SkipReason::NoData,
            });
            continue;
        }

        if bars.len() < min_bars {
            warn!(%symbol, bars = bars.len(), min_bars, "skipping symbol: short history");
            skipped.push(SkippedSymbol {
                symbol,
                reason: SkipReason::InsufficientBars { bars: bars.len() },
            });
            continue;
        }

        info!(%symbol, bars = bars.len(), "symbol ok");
        valid.push(symbol);
    }

    if valid.is_empty() {
        return Err(SignalbtError::InsufficientData {
            needed: min_bars.max(1),
            got: 0,
        });
    }

    Ok(UniverseValidationResult {
        universe: Universe { symbols: valid },
        skipped,
    })
}
