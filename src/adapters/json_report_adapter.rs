//! JSON report adapter implementing ReportPort.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::domain::backtest::BacktestReport;
use crate::domain::error::SigtraderError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &BacktestReport, output: Option<&Path>) -> Result<(), SigtraderError> {
        let mut json = report.to_json()?;
        json.push('\n');

        match output {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, json).map_err(|e| SigtraderError::Report {
                    reason: format!("failed to write {}: {}", path.display(), e),
                })?;
            }
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(json.as_bytes())?;
                handle.flush()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{BacktestConfig, BacktestResult};
    use crate::domain::portfolio::Portfolio;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn empty_report() -> BacktestReport {
        let config = BacktestConfig::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        );
        let result = BacktestResult {
            portfolio: Portfolio::new(config.initial_capital),
            signal_count: 0,
        };
        BacktestReport::new("breakout", &config, &result)
    }

    #[test]
    fn writes_report_to_nested_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.json");

        JsonReportAdapter::new().write(&empty_report(), Some(&path)).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["strategy"], "breakout");
        assert_eq!(value["period"]["start"], "2024-01-01");
        assert_eq!(value["metrics"]["total_trades"], 0);
        assert!(value["trades"].as_array().unwrap().is_empty());
    }

    #[test]
    fn rewriting_produces_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let adapter = JsonReportAdapter::new();

        adapter.write(&empty_report(), Some(&path)).unwrap();
        let first = fs::read(&path).unwrap();
        adapter.write(&empty_report(), Some(&path)).unwrap();
        assert_eq!(first, fs::read(&path).unwrap());
    }
}
