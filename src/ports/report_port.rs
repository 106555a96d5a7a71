//! Report output port.

use crate::domain::error::SignalbtError;
use crate::domain::metrics::BacktestResult;
use crate::domain::strategy::Candidate;
use std::path::Path;

pub trait ReportPort {
    /// Write the trade ledger and equity curve of a run under `output_dir`.
    fn write_result(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), SignalbtError>;

    /// Write the scan candidates to `output_path`.
    fn write_candidates(
        &self,
        candidates: &[Candidate],
        output_path: &Path,
    ) -> Result<(), SignalbtError>;
}
