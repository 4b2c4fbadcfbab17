//! CSV file data adapter: one `{instrument}.csv` per instrument under a base
//! directory, with a `timestamp,open,high,low,close,volume` header.

use crate::adapters::raw_bar::{bars_in_range, RawBar};
use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", instrument))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        instrument: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, SigtraderError> {
        let path = self.csv_path(instrument);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SigtraderError::NoData {
                instrument: instrument.to_string(),
            },
            _ => SigtraderError::Data {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut records = Vec::new();

        for (index, result) in rdr.deserialize::<RawBar>().enumerate() {
            let record = result.map_err(|e| SigtraderError::MalformedBar {
                instrument: instrument.to_string(),
                index,
                reason: format!("CSV parse error: {}", e),
            })?;
            records.push(record);
        }

        bars_in_range(instrument, records, start_date, end_date)
    }

    fn list_instruments(&self) -> Result<Vec<String>, SigtraderError> {
        list_with_extension(&self.base_path, "csv")
    }
}

/// File stems under `dir` carrying `extension`, sorted.
pub(crate) fn list_with_extension(dir: &std::path::Path, extension: &str) -> Result<Vec<String>, SigtraderError> {
    let entries = fs::read_dir(dir).map_err(|e| SigtraderError::Data {
        reason: format!("failed to read directory {}: {}", dir.display(), e),
    })?;

    let mut instruments = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SigtraderError::Data {
            reason: format!("directory entry error: {}", e),
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            instruments.push(stem.to_string());
        }
    }

    instruments.sort();
    Ok(instruments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("005930.csv"), csv_content).unwrap();
        fs::write(path.join("000660.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_bars_returns_correct_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_bars("005930", None, None).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000.0);
    }

    #[test]
    fn fetch_bars_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let day = NaiveDate::from_ymd_opt(2024, 1, 16);
        let bars = adapter.fetch_bars("005930", day, day).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 110.0);
    }

    #[test]
    fn fetch_bars_empty_file_yields_no_bars() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(adapter.fetch_bars("000660", None, None).unwrap().is_empty());
    }

    #[test]
    fn fetch_bars_missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_bars("XYZ", None, None);
        assert!(matches!(result, Err(SigtraderError::NoData { instrument }) if instrument == "XYZ"));
    }

    #[test]
    fn fetch_bars_reports_malformed_row() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("BAD.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-15,100,110,90,105,1000\n\
             2024-01-16,100,,90,105,1000\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());

        let err = adapter.fetch_bars("BAD", None, None).unwrap_err();
        assert!(matches!(err, SigtraderError::MalformedBar { index: 1, reason, .. } if reason == "missing high"));
    }

    #[test]
    fn list_instruments_returns_sorted_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(adapter.list_instruments().unwrap(), vec!["000660", "005930"]);
    }
}
