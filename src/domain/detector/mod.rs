//! Pattern detectors.
//!
//! Every detector turns a bar sequence into signals in one forward pass. A
//! signal at bar `i` only reads bars `0..=i` and their indicator values, so
//! running a detector on a prefix of a series yields a prefix of its signals.

pub mod breakout;
pub mod breakout_confirmation;
pub mod divergence;
pub mod ema_crossover;
pub mod peaks;
pub mod trend_pullback;

pub use breakout::{BreakoutConfig, BreakoutDetector};
pub use breakout_confirmation::{BreakoutConfirmationConfig, BreakoutConfirmationDetector, PendingSetup};
pub use divergence::{DivergenceConfig, DivergenceDetector};
pub use ema_crossover::{EmaCrossoverConfig, EmaCrossoverDetector};
pub use trend_pullback::{TrendPullbackConfig, TrendPullbackDetector};

use crate::domain::indicator::{IndicatorSeries, IndicatorSettings};
use crate::domain::ohlcv::Bar;
use crate::domain::position::ExitRules;
use crate::domain::signal::Signal;

pub trait Detector {
    /// Tag stamped on every signal this detector emits.
    fn name(&self) -> &'static str;

    /// Indicator periods this detector reads.
    fn indicator_settings(&self) -> IndicatorSettings;

    /// Exit handling for positions opened from this detector's signals.
    fn exit_rules(&self) -> ExitRules;

    /// Scan `bars` with precomputed indicators; `indicators` must be aligned
    /// to `bars`.
    fn detect_with(&self, instrument: &str, bars: &[Bar], indicators: &IndicatorSeries) -> Vec<Signal>;

    fn detect(&self, instrument: &str, bars: &[Bar]) -> Vec<Signal> {
        let indicators = IndicatorSeries::compute(bars, &self.indicator_settings());
        self.detect_with(instrument, bars, &indicators)
    }
}

/// Per-field columns of a bar slice for window lookups.
#[derive(Debug, Clone, Default)]
pub(crate) struct PriceColumns {
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl PriceColumns {
    pub fn from_bars(bars: &[Bar]) -> Self {
        PriceColumns {
            highs: bars.iter().map(|b| b.high).collect(),
            lows: bars.iter().map(|b| b.low).collect(),
            closes: bars.iter().map(|b| b.close).collect(),
            volumes: bars.iter().map(|b| b.volume).collect(),
        }
    }
}

/// Volume spike points: 40 at 5x, 35 at 4x, 30 at 3x, 20 at 2x.
pub fn volume_score(ratio: f64) -> u32 {
    if ratio >= 5.0 {
        40
    } else if ratio >= 4.0 {
        35
    } else if ratio >= 3.0 {
        30
    } else if ratio >= 2.0 {
        20
    } else {
        0
    }
}

/// Momentum points from the RSI level.
pub fn rsi_level_score(rsi: f64) -> u32 {
    if rsi >= 80.0 {
        30
    } else if rsi >= 75.0 {
        25
    } else if rsi >= 70.0 {
        20
    } else if rsi >= 60.0 {
        15
    } else if rsi >= 50.0 {
        10
    } else {
        0
    }
}

/// Points for distance (in RSI units) from a reference level.
pub fn rsi_distance_score(distance: f64) -> u32 {
    let distance = distance.abs();
    if distance >= 10.0 {
        30
    } else if distance >= 5.0 {
        25
    } else if distance >= 2.0 {
        20
    } else {
        0
    }
}

/// Points for MACD histogram size as a percentage of price.
pub fn macd_strength_score(histogram: f64, close: f64) -> u32 {
    if close <= 0.0 {
        return 0;
    }
    let pct = (histogram / close * 100.0).abs();
    if pct >= 0.05 {
        30
    } else if pct >= 0.03 {
        25
    } else if pct >= 0.01 {
        20
    } else {
        0
    }
}

/// Points for divergence strength (percent).
pub fn divergence_score(strength: f64) -> u32 {
    if strength >= 10.0 {
        30
    } else if strength >= 5.0 {
        25
    } else if strength >= 2.0 {
        20
    } else {
        0
    }
}
