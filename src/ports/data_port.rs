//! Data access port.

use crate::domain::error::SignalbtError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `symbol`, sorted by date. `None` bounds are open-ended.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, SignalbtError>;

    fn list_symbols(&self) -> Result<Vec<String>, SignalbtError>;

    /// First date, last date and bar count, or `None` when there is no data.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SignalbtError> {
        let bars = self.fetch_ohlcv(symbol, None, None)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
