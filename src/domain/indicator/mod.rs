//! Technical indicator implementations.
//!
//! Every indicator is a pure function over a slice and returns one
//! `Option<f64>` per input bar. `None` marks the warm-up window; consumers
//! skip a bar while any indicator they need is still `None`.
//!
//! [`IndicatorSeries`] bundles the columns a detector reads, aligned to the
//! bar sequence that produced them.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rolling;
pub mod rsi;

pub use atr::calculate_atr;
pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdSeries};
pub use rolling::rolling_mean;
pub use rsi::calculate_rsi;

use crate::domain::ohlcv::Bar;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    VolumeAvg(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::VolumeAvg(period) => write!(f, "VOLUME_AVG({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}

/// Periods for the indicator columns a detector consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr: usize,
    pub volume_avg: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        IndicatorSettings {
            ema_fast: 20,
            ema_slow: 50,
            rsi: 14,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            atr: 14,
            volume_avg: 20,
        }
    }
}

impl IndicatorSettings {
    pub fn indicator_types(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Ema(self.ema_fast),
            IndicatorType::Ema(self.ema_slow),
            IndicatorType::Rsi(self.rsi),
            IndicatorType::Macd {
                fast: self.macd_fast,
                slow: self.macd_slow,
                signal: self.macd_signal,
            },
            IndicatorType::Atr(self.atr),
            IndicatorType::VolumeAvg(self.volume_avg),
        ]
    }
}

/// Parallel indicator columns aligned to a bar sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub ema_fast: Vec<Option<f64>>,
    pub ema_slow: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_histogram: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
    pub volume_avg: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn compute(bars: &[Bar], settings: &IndicatorSettings) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let macd = calculate_macd(
            &closes,
            settings.macd_fast,
            settings.macd_slow,
            settings.macd_signal,
        );

        IndicatorSeries {
            ema_fast: calculate_ema(&closes, settings.ema_fast),
            ema_slow: calculate_ema(&closes, settings.ema_slow),
            rsi: calculate_rsi(&closes, settings.rsi),
            macd: macd.line,
            macd_signal: macd.signal,
            macd_histogram: macd.histogram,
            atr: calculate_atr(bars, settings.atr),
            volume_avg: rolling_mean(&volumes, settings.volume_avg),
        }
    }

    pub fn len(&self) -> usize {
        self.ema_fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_fast.is_empty()
    }
}

/// Read one column at `i`, treating out-of-range as undefined.
pub fn value_at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten()
}
