//! Market data port.

use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `instrument` dated within the optional bounds (inclusive),
    /// ascending by timestamp. An unknown instrument is `NoData`.
    fn fetch_bars(
        &self,
        instrument: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, SigtraderError>;

    /// Instruments this source can serve, sorted.
    fn list_instruments(&self) -> Result<Vec<String>, SigtraderError>;
}
