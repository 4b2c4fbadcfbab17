//! Golden and death crosses of a fast EMA over a slow EMA.

use crate::domain::detector::{macd_strength_score, volume_score, Detector};
use crate::domain::indicator::{value_at, IndicatorSeries, IndicatorSettings};
use crate::domain::ohlcv::Bar;
use crate::domain::position::{ExitPolicy, ExitRules};
use crate::domain::signal::{Side, Signal};

#[derive(Debug, Clone, PartialEq)]
pub struct EmaCrossoverConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub volume_avg_period: usize,
    pub volume_multiplier: f64,
    pub stop_loss_pct: f64,
}

impl Default for EmaCrossoverConfig {
    fn default() -> Self {
        EmaCrossoverConfig {
            fast_period: 20,
            slow_period: 50,
            volume_avg_period: 20,
            volume_multiplier: 1.2,
            stop_loss_pct: 0.03,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossKind {
    Golden,
    Death,
}

/// Golden when fast goes from `<=` slow to `>`; death when it goes from `>`
/// to `<=`.
pub fn classify_cross(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> Option<CrossKind> {
    if prev_fast <= prev_slow && fast > slow {
        Some(CrossKind::Golden)
    } else if prev_fast > prev_slow && fast <= slow {
        Some(CrossKind::Death)
    } else {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmaCrossoverDetector {
    pub config: EmaCrossoverConfig,
}

impl EmaCrossoverDetector {
    pub fn new(config: EmaCrossoverConfig) -> Self {
        Self { config }
    }
}

impl Detector for EmaCrossoverDetector {
    fn name(&self) -> &'static str {
        "ema_crossover"
    }

    fn indicator_settings(&self) -> IndicatorSettings {
        IndicatorSettings {
            ema_fast: self.config.fast_period,
            ema_slow: self.config.slow_period,
            volume_avg: self.config.volume_avg_period,
            ..IndicatorSettings::default()
        }
    }

    /// Golden-cross longs ride until the stop or the next death cross.
    fn exit_rules(&self) -> ExitRules {
        ExitRules {
            policy: ExitPolicy::Fixed,
            exit_on_opposing_signal: true,
            max_hold_bars: None,
        }
    }

    fn detect_with(&self, instrument: &str, bars: &[Bar], indicators: &IndicatorSeries) -> Vec<Signal> {
        let cfg = &self.config;
        let mut signals = Vec::new();

        for i in 1..bars.len() {
            let (Some(prev_fast), Some(prev_slow), Some(fast), Some(slow)) = (
                value_at(&indicators.ema_fast, i - 1),
                value_at(&indicators.ema_slow, i - 1),
                value_at(&indicators.ema_fast, i),
                value_at(&indicators.ema_slow, i),
            ) else {
                continue;
            };
            let Some(kind) = classify_cross(prev_fast, prev_slow, fast, slow) else {
                continue;
            };

            let bar = &bars[i];
            let volume_ratio = value_at(&indicators.volume_avg, i)
                .filter(|avg| *avg > 0.0)
                .map(|avg| bar.volume / avg);
            let macd_points = value_at(&indicators.macd_histogram, i)
                .map(|h| macd_strength_score(h, bar.close))
                .unwrap_or(0);

            let signal = match kind {
                CrossKind::Golden => {
                    let Some(volume_ratio) = volume_ratio else {
                        continue;
                    };
                    if volume_ratio < cfg.volume_multiplier || !bar.is_green() || bar.close < fast {
                        continue;
                    }
                    Signal::new(
                        instrument,
                        bar.timestamp,
                        i,
                        self.name(),
                        Side::Buy,
                        bar.close,
                        bar.close * (1.0 - cfg.stop_loss_pct),
                    )
                    .with_metric("volume_ratio", volume_ratio)
                    .with_confidence(40 + volume_score(volume_ratio) + macd_points)
                }
                CrossKind::Death => {
                    let mut signal = Signal::new(
                        instrument,
                        bar.timestamp,
                        i,
                        self.name(),
                        Side::Sell,
                        bar.close,
                        bar.close * (1.0 + cfg.stop_loss_pct),
                    )
                    .with_confidence(40 + macd_points);
                    if let Some(volume_ratio) = volume_ratio {
                        signal = signal.with_metric("volume_ratio", volume_ratio);
                    }
                    signal
                }
            };

            signals.push(
                signal
                    .with_metric("ema_fast", fast)
                    .with_metric("ema_slow", slow)
                    .with_metric("ema_spread_pct", (fast - slow) / slow * 100.0),
            );
        }

        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detector::test_support::bars_from_closes;

    #[test]
    fn classify_cross_cases() {
        assert_eq!(classify_cross(1.0, 1.0, 1.1, 1.0), Some(CrossKind::Golden));
        assert_eq!(classify_cross(1.1, 1.0, 1.0, 1.0), Some(CrossKind::Death));
        assert_eq!(classify_cross(1.1, 1.0, 1.2, 1.0), None);
        assert_eq!(classify_cross(0.9, 1.0, 0.95, 1.0), None);
    }

    /// Falls for 60 bars, rallies for 40, then falls again.
    fn v_shape_closes() -> Vec<f64> {
        let mut closes = Vec::new();
        let mut c = 150.0;
        for _ in 0..60 {
            c -= 0.5;
            closes.push(c);
        }
        for _ in 0..40 {
            c += 2.0;
            closes.push(c);
        }
        for _ in 0..40 {
            c -= 3.0;
            closes.push(c);
        }
        closes
    }

    fn flips(indicators: &IndicatorSeries) -> Vec<(usize, CrossKind)> {
        (1..indicators.len())
            .filter_map(|i| {
                let kind = classify_cross(
                    value_at(&indicators.ema_fast, i - 1)?,
                    value_at(&indicators.ema_slow, i - 1)?,
                    value_at(&indicators.ema_fast, i)?,
                    value_at(&indicators.ema_slow, i)?,
                )?;
                Some((i, kind))
            })
            .collect()
    }

    #[test]
    fn golden_then_death_cross() {
        let detector = EmaCrossoverDetector::default();
        let mut bars = bars_from_closes(&v_shape_closes(), 1_000.0);
        let indicators = IndicatorSeries::compute(&bars, &detector.indicator_settings());
        let crosses = flips(&indicators);
        assert_eq!(crosses.len(), 2);
        let (golden_at, golden) = crosses[0];
        let (death_at, death) = crosses[1];
        assert_eq!(golden, CrossKind::Golden);
        assert_eq!(death, CrossKind::Death);

        bars[golden_at].volume = 5_000.0;
        let signals = detector.detect("X", &bars);
        assert_eq!(signals.len(), 2);
        assert_eq!((signals[0].bar_index, signals[0].side), (golden_at, Side::Buy));
        assert!((signals[0].stop_loss - bars[golden_at].close * 0.97).abs() < 1e-9);
        assert!(signals[0].take_profit.is_empty());
        assert_eq!((signals[1].bar_index, signals[1].side), (death_at, Side::Sell));
    }

    #[test]
    fn golden_cross_needs_volume() {
        let detector = EmaCrossoverDetector::default();
        let bars = bars_from_closes(&v_shape_closes(), 1_000.0);
        let signals = detector.detect("X", &bars);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Sell);
    }

    #[test]
    fn exits_on_death_cross() {
        assert!(EmaCrossoverDetector::default().exit_rules().exit_on_opposing_signal);
    }
}
