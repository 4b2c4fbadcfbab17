//! Instrument universe: parses the configured code list and loads bars for
//! each instrument through the data port.

use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

impl From<UniverseError> for SigtraderError {
    fn from(err: UniverseError) -> Self {
        SigtraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "codes".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Split a comma-separated code list. Codes keep their case since they name
/// data files.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let code = token.trim();
        if code.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        if !seen.insert(code.to_string()) {
            return Err(UniverseError::DuplicateCode(code.to_string()));
        }
        codes.push(code.to_string());
    }

    Ok(codes)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCode {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct LoadedUniverse {
    /// Instruments with bars, in the order they were requested.
    pub instruments: Vec<(String, Vec<Bar>)>,
    pub skipped: Vec<SkippedCode>,
}

impl LoadedUniverse {
    pub fn count(&self) -> usize {
        self.instruments.len()
    }
}

/// Fetch bars for every code up to `end_date`.
///
/// History before the backtest start is kept as indicator warm-up, so no
/// lower bound is passed to the port. Instruments without data are skipped
/// with a warning; a malformed bar fails the whole load. Fails with
/// `InsufficientData` when nothing could be loaded.
pub fn load_universe(
    data_port: &dyn DataPort,
    codes: &[String],
    end_date: Option<NaiveDate>,
) -> Result<LoadedUniverse, SigtraderError> {
    let mut instruments = Vec::new();
    let mut skipped = Vec::new();

    for code in codes {
        let bars = match data_port.fetch_bars(code, None, end_date) {
            Ok(bars) => bars,
            Err(e @ SigtraderError::MalformedBar { .. }) => return Err(e),
            Err(SigtraderError::NoData { .. }) => {
                warn!(instrument = %code, "skipping instrument: no data");
                skipped.push(SkippedCode {
                    code: code.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
            Err(e) => {
                warn!(instrument = %code, error = %e, "skipping instrument");
                skipped.push(SkippedCode {
                    code: code.clone(),
                    reason: SkipReason::Unreadable(e.to_string()),
                });
                continue;
            }
        };

        if bars.is_empty() {
            warn!(instrument = %code, "skipping instrument: no bars in range");
            skipped.push(SkippedCode {
                code: code.clone(),
                reason: SkipReason::NoData,
            });
            continue;
        }

        info!(instrument = %code, bars = bars.len(), "loaded bars");
        instruments.push((code.clone(), bars));
    }

    if instruments.is_empty() {
        return Err(SigtraderError::InsufficientData {
            instrument: "all".to_string(),
            bars: 0,
            minimum: 1,
        });
    }

    if !skipped.is_empty() {
        info!(
            loaded = instruments.len(),
            requested = codes.len(),
            "loaded a partial universe"
        );
    }

    Ok(LoadedUniverse { instruments, skipped })
}
