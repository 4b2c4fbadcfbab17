//! JSON file data adapter: one `{instrument}.json` per instrument, holding
//! an array of bar objects. Numeric fields may be numbers or strings.

use crate::adapters::csv_adapter::list_with_extension;
use crate::adapters::raw_bar::{bars_in_range, RawBar};
use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct JsonBar {
    #[serde(alias = "date")]
    timestamp: Option<Value>,
    open: Option<Value>,
    high: Option<Value>,
    low: Option<Value>,
    close: Option<Value>,
    volume: Option<Value>,
}

fn field_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<JsonBar> for RawBar {
    fn from(bar: JsonBar) -> Self {
        RawBar {
            timestamp: field_text(bar.timestamp),
            open: field_text(bar.open),
            high: field_text(bar.high),
            low: field_text(bar.low),
            close: field_text(bar.close),
            volume: field_text(bar.volume),
        }
    }
}

pub struct JsonBarsAdapter {
    base_path: PathBuf,
}

impl JsonBarsAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn json_path(&self, instrument: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", instrument))
    }
}

impl DataPort for JsonBarsAdapter {
    fn fetch_bars(
        &self,
        instrument: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, SigtraderError> {
        let path = self.json_path(instrument);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SigtraderError::NoData {
                instrument: instrument.to_string(),
            },
            _ => SigtraderError::Data {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let parsed: Vec<JsonBar> = serde_json::from_str(&content).map_err(|e| SigtraderError::Data {
            reason: format!("invalid JSON in {}: {}", path.display(), e),
        })?;
        let records = parsed.into_iter().map(RawBar::from).collect();

        bars_in_range(instrument, records, start_date, end_date)
    }

    fn list_instruments(&self) -> Result<Vec<String>, SigtraderError> {
        list_with_extension(&self.base_path, "json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn fetch_bars_reads_numbers_and_strings() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "AAA.json",
            r#"[
                {"timestamp": "2024-01-15", "open": 100, "high": 110, "low": 90, "close": 105, "volume": 5000},
                {"date": "2024-01-16 09:30:00", "open": "105", "high": "115", "low": "100", "close": "110", "volume": "6000"}
            ]"#,
        );
        let adapter = JsonBarsAdapter::new(dir.path().to_path_buf());

        let bars = adapter.fetch_bars("AAA", None, None).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[1].volume, 6000.0);
        assert_eq!(bars[1].timestamp.format("%H:%M").to_string(), "09:30");
    }

    #[test]
    fn null_field_is_malformed() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "AAA.json",
            r#"[{"timestamp": "2024-01-15", "open": 100, "high": null, "low": 90, "close": 105, "volume": 5000}]"#,
        );
        let adapter = JsonBarsAdapter::new(dir.path().to_path_buf());

        let err = adapter.fetch_bars("AAA", None, None).unwrap_err();
        assert!(matches!(err, SigtraderError::MalformedBar { index: 0, .. }));
    }

    #[test]
    fn missing_file_is_no_data() {
        let dir = TempDir::new().unwrap();
        let adapter = JsonBarsAdapter::new(dir.path().to_path_buf());
        assert!(matches!(
            adapter.fetch_bars("NOPE", None, None),
            Err(SigtraderError::NoData { .. })
        ));
    }

    #[test]
    fn non_array_document_is_data_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "AAA.json", r#"{"bars": []}"#);
        let adapter = JsonBarsAdapter::new(dir.path().to_path_buf());
        assert!(matches!(
            adapter.fetch_bars("AAA", None, None),
            Err(SigtraderError::Data { .. })
        ));
    }

    #[test]
    fn list_instruments_only_json() {
        let dir = TempDir::new().unwrap();
        write(&dir, "BBB.json", "[]");
        write(&dir, "AAA.json", "[]");
        write(&dir, "CCC.csv", "");
        let adapter = JsonBarsAdapter::new(dir.path().to_path_buf());
        assert_eq!(adapter.list_instruments().unwrap(), vec!["AAA", "BBB"]);
    }
}
