//! Report output port.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::SigtraderError;
use std::path::Path;

pub trait ReportPort {
    /// Write `report` to `output`, or to standard output when `None`.
    fn write(&self, report: &BacktestReport, output: Option<&Path>) -> Result<(), SigtraderError>;
}
