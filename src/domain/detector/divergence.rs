//! Bearish divergence: price prints a higher peak while MACD prints a lower
//! one, confirmed by a volume spike and fading RSI.

use crate::domain::detector::peaks::confirmed_peaks;
use crate::domain::detector::{divergence_score, rsi_distance_score, volume_score, Detector};
use crate::domain::indicator::{value_at, IndicatorSeries, IndicatorSettings};
use crate::domain::ohlcv::Bar;
use crate::domain::position::{ExitPolicy, ExitRules};
use crate::domain::signal::{Side, Signal};

#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceConfig {
    /// Bars on each side a peak must dominate.
    pub peak_order: usize,
    /// Window in which both peaks must lie.
    pub lookback: usize,
    /// Current volume over the previous bar's volume.
    pub volume_multiplier: f64,
    pub rsi_period: usize,
    pub rsi_threshold: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_hold_bars: usize,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        DivergenceConfig {
            peak_order: 3,
            lookback: 20,
            volume_multiplier: 3.0,
            rsi_period: 14,
            rsi_threshold: 70.0,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.08,
            max_hold_bars: 30,
        }
    }
}

/// The two most recent peaks in each column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPair {
    pub price_first: f64,
    pub price_second: f64,
    pub macd_first: f64,
    pub macd_second: f64,
}

impl PeakPair {
    pub fn is_bearish(&self) -> bool {
        self.price_second > self.price_first && self.macd_second < self.macd_first
    }

    /// Price rise plus MACD decline, both in percent.
    pub fn strength(&self) -> f64 {
        let price = (self.price_second - self.price_first) / self.price_first * 100.0;
        let macd = (self.macd_first - self.macd_second) / self.macd_first.abs() * 100.0;
        price + macd
    }
}

#[derive(Debug, Clone, Default)]
pub struct DivergenceDetector {
    pub config: DivergenceConfig,
}

impl DivergenceDetector {
    pub fn new(config: DivergenceConfig) -> Self {
        Self { config }
    }

    fn peak_pair(&self, highs: &[Option<f64>], macd: &[Option<f64>], i: usize) -> Option<PeakPair> {
        let cfg = &self.config;
        let from = i.saturating_sub(cfg.lookback);
        let price_peaks = confirmed_peaks(highs, cfg.peak_order, from, i);
        let macd_peaks = confirmed_peaks(macd, cfg.peak_order, from, i);
        let [.., p1, p2] = price_peaks.as_slice() else {
            return None;
        };
        let [.., m1, m2] = macd_peaks.as_slice() else {
            return None;
        };
        Some(PeakPair {
            price_first: highs[*p1]?,
            price_second: highs[*p2]?,
            macd_first: macd[*m1]?,
            macd_second: macd[*m2]?,
        })
    }

    fn rsi_fading(&self, previous: f64, current: f64) -> bool {
        let threshold = self.config.rsi_threshold;
        let crossed_down = previous >= threshold && current < threshold;
        let declining = current < threshold && current < previous;
        crossed_down || declining
    }
}

impl Detector for DivergenceDetector {
    fn name(&self) -> &'static str {
        "bearish_divergence"
    }

    fn indicator_settings(&self) -> IndicatorSettings {
        IndicatorSettings {
            rsi: self.config.rsi_period,
            ..IndicatorSettings::default()
        }
    }

    fn exit_rules(&self) -> ExitRules {
        ExitRules {
            policy: ExitPolicy::Fixed,
            exit_on_opposing_signal: false,
            max_hold_bars: Some(self.config.max_hold_bars),
        }
    }

    fn detect_with(&self, instrument: &str, bars: &[Bar], indicators: &IndicatorSeries) -> Vec<Signal> {
        let cfg = &self.config;
        let highs: Vec<Option<f64>> = bars.iter().map(|b| Some(b.high)).collect();
        let mut signals = Vec::new();

        for i in cfg.lookback.max(1)..bars.len() {
            let bar = &bars[i];
            let previous_volume = bars[i - 1].volume;
            if previous_volume <= 0.0 {
                continue;
            }
            let volume_ratio = bar.volume / previous_volume;
            if volume_ratio < cfg.volume_multiplier {
                continue;
            }

            let (Some(rsi_prev), Some(rsi)) = (value_at(&indicators.rsi, i - 1), value_at(&indicators.rsi, i)) else {
                continue;
            };
            if !self.rsi_fading(rsi_prev, rsi) {
                continue;
            }

            let Some(peaks) = self.peak_pair(&highs, &indicators.macd, i) else {
                continue;
            };
            if !peaks.is_bearish() || peaks.macd_first == 0.0 {
                continue;
            }
            let strength = peaks.strength();

            let entry = bar.close;
            let confidence = volume_score(volume_ratio)
                + divergence_score(strength)
                + rsi_distance_score(rsi - cfg.rsi_threshold);
            let signal = Signal::new(
                instrument,
                bar.timestamp,
                i,
                self.name(),
                Side::Sell,
                entry,
                entry * (1.0 + cfg.stop_loss_pct),
            )
            .with_target(entry * (1.0 - cfg.take_profit_pct), 1.0)
            .with_metric("rsi", rsi)
            .with_metric("volume_ratio", volume_ratio)
            .with_metric("divergence_strength", strength)
            .with_metric("price_peak_1", peaks.price_first)
            .with_metric("price_peak_2", peaks.price_second)
            .with_metric("macd_peak_1", peaks.macd_first)
            .with_metric("macd_peak_2", peaks.macd_second)
            .with_confidence(confidence)
            .with_risk_reward();

            signals.push(signal);
        }

        signals
    }
}
