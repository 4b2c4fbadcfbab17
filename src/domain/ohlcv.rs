//! OHLCV bar representation and structural validation.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::error::SigtraderError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Close above open.
    pub fn is_green(&self) -> bool {
        self.close > self.open
    }

    /// Where the close sits inside the bar's range, 0 at the low and 1 at the high.
    /// A zero-range bar reports 1.0 so it never fails a "closed near the high" test
    /// by accident of rounding.
    pub fn close_position(&self) -> f64 {
        let range = self.high - self.low;
        if range > 0.0 {
            (self.close - self.low) / range
        } else {
            1.0
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Reject bars that break the OHLCV contract. The first violation is fatal for
/// the instrument.
pub fn validate_bars(instrument: &str, bars: &[Bar]) -> Result<(), SigtraderError> {
    let malformed = |index: usize, reason: String| SigtraderError::MalformedBar {
        instrument: instrument.to_string(),
        index,
        reason,
    };

    for (i, bar) in bars.iter().enumerate() {
        let fields = [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
            ("volume", bar.volume),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(malformed(i, format!("{name} is not a finite number")));
            }
        }
        if bar.volume < 0.0 {
            return Err(malformed(i, "negative volume".into()));
        }
        if bar.high < bar.low {
            return Err(malformed(i, "high below low".into()));
        }
        if bar.open < bar.low || bar.open > bar.high {
            return Err(malformed(i, "open outside high/low range".into()));
        }
        if bar.close < bar.low || bar.close > bar.high {
            return Err(malformed(i, "close outside high/low range".into()));
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(malformed(i, "timestamps not strictly increasing".into()));
        }
    }
    Ok(())
}
