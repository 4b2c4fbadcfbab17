#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use sigtrader::domain::backtest::BacktestConfig;
use sigtrader::domain::error::SigtraderError;
use sigtrader::domain::execution::ExecutionConfig;
pub use sigtrader::domain::ohlcv::{parse_timestamp, Bar};
use sigtrader::ports::data_port::DataPort;
use std::collections::BTreeMap;

pub struct MockDataPort {
    pub data: BTreeMap<String, Vec<Bar>>,
    pub errors: BTreeMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn with_bars(mut self, instrument: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(instrument.to_string(), bars);
        self
    }

    pub fn with_error(mut self, instrument: &str, reason: &str) -> Self {
        self.errors.insert(instrument.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        instrument: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, SigtraderError> {
        if let Some(reason) = self.errors.get(instrument) {
            return Err(SigtraderError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(instrument).ok_or_else(|| SigtraderError::NoData {
            instrument: instrument.to_string(),
        })?;
        Ok(bars
            .iter()
            .filter(|b| start_date.is_none_or(|s| b.date() >= s))
            .filter(|b| end_date.is_none_or(|e| b.date() <= e))
            .cloned()
            .collect())
    }

    fn list_instruments(&self) -> Result<Vec<String>, SigtraderError> {
        Ok(self.data.keys().cloned().collect())
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Daily bars from (open, high, low, close, volume) tuples starting 2024-01-01.
pub fn bars_from(rows: &[(f64, f64, f64, f64, f64)]) -> Vec<Bar> {
    let start = parse_timestamp("2024-01-01").unwrap();
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| Bar {
            timestamp: start + Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

/// Bars opening at the previous close with a small range around each close.
pub fn bars_from_closes(closes: &[f64], volume: f64) -> Vec<Bar> {
    let rows: Vec<_> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let open = if i == 0 { c } else { closes[i - 1] };
            (open, c.max(open) * 1.002, c.min(open) * 0.998, c, volume)
        })
        .collect();
    bars_from(&rows)
}

/// `n` bars rising 0.5% a day with a +4% close on 3.5x volume at `spike`.
pub fn uptrend_with_spike(n: usize, spike: usize) -> Vec<Bar> {
    let mut rows = Vec::with_capacity(n);
    let mut close = 100.0;
    for i in 0..n {
        let prev = close;
        close = if i == spike { prev * 1.04 } else { prev * 1.005 };
        let volume = if i == spike { 3_500.0 } else { 1_000.0 };
        rows.push((prev, close * 1.001, prev * 0.999, close, volume));
    }
    bars_from(&rows)
}

/// Sideways series with volume never above 1.7x the base.
pub fn flat_series(n: usize) -> Vec<Bar> {
    let closes: Vec<f64> = (0..n).map(|i| 100.0 + (i % 3) as f64 * 0.1).collect();
    let mut bars = bars_from_closes(&closes, 1_000.0);
    for (i, bar) in bars.iter_mut().enumerate() {
        bar.volume = if i % 7 == 0 { 1_700.0 } else { 1_000.0 };
    }
    bars
}

/// Deterministic zig-zag around a drifting trend; `seed` shifts the phase.
pub fn wavy_series(n: usize, seed: u64) -> Vec<Bar> {
    let phase = (seed % 17) as f64;
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64 + phase;
            100.0 + 0.15 * t + 6.0 * (t / 6.0).sin() + 2.0 * (t / 2.3).cos()
        })
        .collect();
    let mut bars = bars_from_closes(&closes, 1_000.0);
    for (i, bar) in bars.iter_mut().enumerate() {
        bar.volume = 1_000.0 + ((i as u64 * 7 + seed) % 11) as f64 * 250.0;
    }
    bars
}

/// Window covering every generated bar, with no trading costs.
pub fn zero_cost_config(bars: &[Bar]) -> BacktestConfig {
    let mut config = BacktestConfig::new(
        bars.first().map(|b| b.date()).unwrap(),
        bars.last().map(|b| b.date()).unwrap(),
    );
    config.initial_capital = 100_000.0;
    config.execution = ExecutionConfig {
        position_fraction: 0.5,
        commission_rate: 0.0,
        commission_per_trade: 0.0,
        slippage_rate: 0.0,
        allow_shorting: false,
        min_future_bars: 1,
    };
    config
}
