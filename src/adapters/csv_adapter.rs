//! CSV file data adapter: one `<SYMBOL>.csv` per symbol under a data dir.
//!
//! The header must name `date, open, high, low, close, volume` in any order
//! and any case; `market_cap` is read when present. Dates are `YYYY-MM-DD`
//! or `YYYYMMDD`.

use crate::domain::error::SignalbtError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const REQUIRED: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Column positions resolved from a header row.
struct Columns {
    required: [usize; 6],
    market_cap: Option<usize>,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Result<Self, SignalbtError> {
        let position = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let mut required = [0; 6];
        for (slot, name) in required.iter_mut().zip(REQUIRED) {
            *slot = position(name).ok_or_else(|| SignalbtError::MissingColumn {
                column: name.to_string(),
            })?;
        }
        Ok(Columns {
            required,
            market_cap: position("market_cap"),
        })
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .ok()
}

fn parse_f64(
    record: &csv::StringRecord,
    index: usize,
    column: &str,
    line: u64,
) -> Result<f64, SignalbtError> {
    let raw = record.get(index).unwrap_or("").trim();
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SignalbtError::DataSource {
            reason: format!("line {line}: invalid {column} value '{raw}'"),
        }),
    }
}

/// Volumes are whole units; a float with no fraction (`1200.0`) is accepted.
fn parse_volume(record: &csv::StringRecord, index: usize, line: u64) -> Result<i64, SignalbtError> {
    let raw = record.get(index).unwrap_or("").trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.is_finite() => Ok(v as i64),
        _ => Err(SignalbtError::DataSource {
            reason: format!("line {line}: invalid volume value '{raw}'"),
        }),
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Parse bar rows for `symbol` from CSV text.
    pub fn parse_bars(
        symbol: &str,
        content: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, SignalbtError> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let header = rdr.headers().map_err(|e| SignalbtError::DataSource {
            reason: format!("CSV header error: {}", e),
        })?;
        let columns = Columns::from_header(header)?;
        let [date_i, open_i, high_i, low_i, close_i, volume_i] = columns.required;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| SignalbtError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = record.position().map_or(0, |p| p.line());

            let raw_date = record.get(date_i).unwrap_or("");
            let date = parse_date(raw_date).ok_or_else(|| SignalbtError::DataSource {
                reason: format!("line {line}: invalid date '{raw_date}'"),
            })?;
            if start_date.is_some_and(|start| date < start)
                || end_date.is_some_and(|end| date > end)
            {
                continue;
            }

            let market_cap = match columns.market_cap {
                Some(i) if !record.get(i).unwrap_or("").trim().is_empty() => {
                    Some(parse_f64(&record, i, "market_cap", line)?)
                }
                _ => None,
            };

            bars.push(OhlcvBar {
                code: symbol.to_string(),
                date,
                open: parse_f64(&record, open_i, "open", line)?,
                high: parse_f64(&record, high_i, "high", line)?,
                low: parse_f64(&record, low_i, "low", line)?,
                close: parse_f64(&record, close_i, "close", line)?,
                volume: parse_volume(&record, volume_i, line)?,
                market_cap,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    /// `code,name` pairs from a two-column CSV with a header row.
    pub fn read_symbol_names(path: &Path) -> Result<BTreeMap<String, String>, SignalbtError> {
        let mut rdr = csv::Reader::from_path(path).map_err(|e| SignalbtError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut names = BTreeMap::new();
        for result in rdr.records() {
            let record = result.map_err(|e| SignalbtError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;
            if let (Some(code), Some(name)) = (record.get(0), record.get(1)) {
                names.insert(code.trim().to_uppercase(), name.trim().to_string());
            }
        }
        Ok(names)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, SignalbtError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| SignalbtError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::parse_bars(symbol, &content, start_date, end_date)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SignalbtError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SignalbtError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SignalbtError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
