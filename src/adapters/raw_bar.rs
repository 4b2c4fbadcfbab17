//! Text-level bar records shared by the file data adapters.

use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::{parse_timestamp, validate_bars, Bar};
use chrono::NaiveDate;
use serde::Deserialize;

/// One bar as read from a file, before any field is parsed. `date` is
/// accepted as an alias for `timestamp`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBar {
    #[serde(alias = "date")]
    pub timestamp: Option<String>,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<String>,
}

impl RawBar {
    /// Parse every field; a missing or unparsable one is `MalformedBar`.
    pub fn into_bar(self, instrument: &str, index: usize) -> Result<Bar, SigtraderError> {
        let malformed = |reason: String| SigtraderError::MalformedBar {
            instrument: instrument.to_string(),
            index,
            reason,
        };

        let raw_ts = self
            .timestamp
            .ok_or_else(|| malformed("missing timestamp".to_string()))?;
        let timestamp =
            parse_timestamp(&raw_ts).ok_or_else(|| malformed(format!("invalid timestamp {raw_ts:?}")))?;

        let number = |name: &str, value: Option<String>| -> Result<f64, SigtraderError> {
            let value = value.ok_or_else(|| malformed(format!("missing {name}")))?;
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| malformed(format!("invalid {name} value {value:?}")))
        };

        Ok(Bar {
            timestamp,
            open: number("open", self.open)?,
            high: number("high", self.high)?,
            low: number("low", self.low)?,
            close: number("close", self.close)?,
            volume: number("volume", self.volume)?,
        })
    }
}

/// Convert, validate and date-filter a file's records. Indices in errors
/// refer to record positions in the file.
pub fn bars_in_range(
    instrument: &str,
    records: Vec<RawBar>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Vec<Bar>, SigtraderError> {
    let bars = records
        .into_iter()
        .enumerate()
        .map(|(i, raw)| raw.into_bar(instrument, i))
        .collect::<Result<Vec<_>, _>>()?;
    validate_bars(instrument, &bars)?;

    Ok(bars
        .into_iter()
        .filter(|bar| start_date.is_none_or(|start| bar.date() >= start))
        .filter(|bar| end_date.is_none_or(|end| bar.date() <= end))
        .collect())
}
