//! CSV report writer: trade ledger, equity curve and scan candidates.

use crate::domain::error::SignalbtError;
use crate::domain::metrics::BacktestResult;
use crate::domain::strategy::Candidate;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";

#[derive(Debug, serde::Serialize)]
struct TradeRow<'a> {
    date: String,
    symbol: &'a str,
    action: String,
    quantity: i64,
    price: f64,
    commission: f64,
    total_cost: f64,
}

#[derive(Debug, serde::Serialize)]
struct EquityRow {
    date: String,
    cash: f64,
    positions: usize,
    equity: f64,
}

#[derive(Debug, serde::Serialize)]
struct CandidateRow<'a> {
    code: &'a str,
    name: &'a str,
    close: f64,
    nearest_ema: usize,
    distance_pct: String,
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn write_rows<S: serde::Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = S>,
) -> Result<(), SignalbtError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| SignalbtError::DataSource {
        reason: format!("failed to create {}: {}", path.display(), e),
    })?;
    for row in rows {
        writer.serialize(row).map_err(|e| SignalbtError::DataSource {
            reason: format!("failed to write {}: {}", path.display(), e),
        })?;
    }
    writer.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write_result(
        &self,
        result: &BacktestResult,
        output_dir: &Path,
    ) -> Result<(), SignalbtError> {
        fs::create_dir_all(output_dir)?;

        write_rows(
            &output_dir.join(TRADES_FILE),
            result.trades.iter().map(|t| TradeRow {
                date: t.date.to_string(),
                symbol: &t.symbol,
                action: t.action.to_string(),
                quantity: t.quantity,
                price: t.price,
                commission: t.commission,
                total_cost: t.total_cost,
            }),
        )?;

        write_rows(
            &output_dir.join(EQUITY_FILE),
            result.equity_curve.iter().map(|s| EquityRow {
                date: s.date.to_string(),
                cash: s.cash,
                positions: s.positions.len(),
                equity: s.equity,
            }),
        )
    }

    fn write_candidates(
        &self,
        candidates: &[Candidate],
        output_path: &Path,
    ) -> Result<(), SignalbtError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_rows(
            output_path,
            candidates.iter().map(|c| CandidateRow {
                code: &c.code,
                name: &c.name,
                close: c.close,
                nearest_ema: c.nearest_period,
                distance_pct: format!("{:+.2}", c.distance_pct),
            }),
        )
    }
}
