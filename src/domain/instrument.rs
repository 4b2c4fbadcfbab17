//! Per-instrument bundle of bars, indicators and detected signals, plus the
//! unified timeline across instruments.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::detector::Detector;
use crate::domain::error::SigtraderError;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::ohlcv::{validate_bars, Bar};
use crate::domain::signal::Signal;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct InstrumentData {
    pub instrument: String,
    pub bars: Vec<Bar>,
    pub indicators: IndicatorSeries,
    /// Signals keyed by the bar index they were detected on.
    pub signals: BTreeMap<usize, Vec<Signal>>,
    pub timestamp_index: BTreeMap<NaiveDateTime, usize>,
}

impl InstrumentData {
    /// Validate `bars`, compute the detector's indicators over all of them
    /// and run the detector once.
    pub fn prepare(instrument: &str, bars: Vec<Bar>, detector: &dyn Detector) -> Result<Self, SigtraderError> {
        validate_bars(instrument, &bars)?;
        let settings = detector.indicator_settings();
        let columns: Vec<String> = settings.indicator_types().iter().map(ToString::to_string).collect();
        debug!(instrument, bars = bars.len(), indicators = %columns.join(" "), "computing indicators");
        let indicators = IndicatorSeries::compute(&bars, &settings);
        let mut signals: BTreeMap<usize, Vec<Signal>> = BTreeMap::new();
        for signal in detector.detect_with(instrument, &bars, &indicators) {
            signals.entry(signal.bar_index).or_default().push(signal);
        }
        let timestamp_index = bars.iter().enumerate().map(|(i, bar)| (bar.timestamp, i)).collect();

        Ok(InstrumentData {
            instrument: instrument.to_string(),
            bars,
            indicators,
            signals,
            timestamp_index,
        })
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar_index(&self, timestamp: NaiveDateTime) -> Option<usize> {
        self.timestamp_index.get(&timestamp).copied()
    }

    pub fn signals_at(&self, bar_index: usize) -> &[Signal] {
        self.signals.get(&bar_index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn signal_count(&self) -> usize {
        self.signals.values().map(Vec::len).sum()
    }

    /// Index of the last bar dated on or before `end`.
    pub fn last_index_until(&self, end: NaiveDate) -> Option<usize> {
        self.bars.iter().rposition(|bar| bar.date() <= end)
    }
}

/// Sorted unique timestamps across all instruments.
pub fn build_unified_timeline(data: &[InstrumentData]) -> Vec<NaiveDateTime> {
    let unique: BTreeSet<NaiveDateTime> = data
        .iter()
        .flat_map(|d| d.bars.iter().map(|bar| bar.timestamp))
        .collect();
    unique.into_iter().collect()
}
