//! Volume breakout above the prior N-bar high.

use crate::domain::detector::{macd_strength_score, rsi_level_score, volume_score, Detector};
use crate::domain::indicator::rolling::highest;
use crate::domain::indicator::{value_at, IndicatorSeries, IndicatorSettings};
use crate::domain::ohlcv::Bar;
use crate::domain::position::{ExitPolicy, ExitRules};
use crate::domain::signal::{Side, Signal};

#[derive(Debug, Clone, PartialEq)]
pub struct BreakoutConfig {
    pub lookback: usize,
    pub volume_avg_period: usize,
    pub volume_multiplier: f64,
    pub rsi_period: usize,
    pub rsi_min: f64,
    pub rsi_max: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_hold_bars: usize,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        BreakoutConfig {
            lookback: 20,
            volume_avg_period: 20,
            volume_multiplier: 2.0,
            rsi_period: 14,
            rsi_min: 50.0,
            rsi_max: 70.0,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.10,
            max_hold_bars: 30,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BreakoutDetector {
    pub config: BreakoutConfig,
}

impl BreakoutDetector {
    pub fn new(config: BreakoutConfig) -> Self {
        Self { config }
    }
}

impl Detector for BreakoutDetector {
    fn name(&self) -> &'static str {
        "breakout"
    }

    fn indicator_settings(&self) -> IndicatorSettings {
        IndicatorSettings {
            rsi: self.config.rsi_period,
            volume_avg: self.config.volume_avg_period,
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
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let mut signals = Vec::new();

        for (i, bar) in bars.iter().enumerate().skip(cfg.lookback) {
            let (Some(rsi), Some(volume_avg)) = (
                value_at(&indicators.rsi, i),
                value_at(&indicators.volume_avg, i),
            ) else {
                continue;
            };
            let Some(prior_high) = highest(&highs, i - cfg.lookback, i) else {
                continue;
            };
            if volume_avg <= 0.0 {
                continue;
            }

            let volume_ratio = bar.volume / volume_avg;
            if bar.close <= prior_high
                || volume_ratio < cfg.volume_multiplier
                || rsi < cfg.rsi_min
                || rsi > cfg.rsi_max
            {
                continue;
            }

            let entry = bar.close;
            let mut confidence = volume_score(volume_ratio) + rsi_level_score(rsi);
            let mut signal = Signal::new(
                instrument,
                bar.timestamp,
                i,
                self.name(),
                Side::Buy,
                entry,
                entry * (1.0 - cfg.stop_loss_pct),
            )
            .with_target(entry * (1.0 + cfg.take_profit_pct), 1.0)
            .with_metric("rsi", rsi)
            .with_metric("volume_ratio", volume_ratio)
            .with_metric("breakout_level", prior_high);

            if let Some(histogram) = value_at(&indicators.macd_histogram, i) {
                confidence += macd_strength_score(histogram, bar.close);
                signal = signal.with_metric("macd_histogram", histogram);
            }

            signals.push(signal.with_confidence(confidence).with_risk_reward());
        }

        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detector::test_support::{bars_from, bars_from_closes};

    /// Uptrend with a volume spike and a +4% close at `spike`.
    fn uptrend_with_spike(n: usize, spike: usize) -> Vec<Bar> {
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

    #[test]
    fn spike_in_uptrend_yields_one_signal() {
        let detector = BreakoutDetector::new(BreakoutConfig {
            rsi_max: 100.0,
            ..BreakoutConfig::default()
        });
        let bars = uptrend_with_spike(60, 31);
        let signals = detector.detect("UP", &bars);

        assert_eq!(signals.len(), 1);
        let s = &signals[0];
        assert_eq!(s.bar_index, 31);
        assert!((s.entry_price - bars[31].close).abs() < 1e-12);
        assert!((s.stop_loss - s.entry_price * 0.95).abs() < 1e-9);
        assert_eq!(s.take_profit.len(), 1);
        assert!((s.take_profit[0].price - s.entry_price * 1.10).abs() < 1e-9);
        assert!(s.supporting_metrics["rsi"] >= 70.0);
        assert!((s.supporting_metrics["risk_reward"] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn overbought_spike_filtered_by_default_band() {
        let signals = BreakoutDetector::default().detect("UP", &uptrend_with_spike(60, 31));
        assert!(signals.is_empty());
    }

    #[test]
    fn flat_series_has_no_signals() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i % 3) as f64 * 0.1).collect();
        let mut bars = bars_from_closes(&closes, 1_000.0);
        for (i, bar) in bars.iter_mut().enumerate() {
            bar.volume = if i % 7 == 0 { 1_700.0 } else { 1_000.0 };
        }
        assert!(BreakoutDetector::default().detect("FLAT", &bars).is_empty());
    }

    #[test]
    fn warmup_bars_never_signal() {
        let bars = uptrend_with_spike(15, 10);
        let detector = BreakoutDetector::new(BreakoutConfig {
            rsi_max: 100.0,
            ..BreakoutConfig::default()
        });
        assert!(detector.detect("SHORT", &bars).is_empty());
    }

    #[test]
    fn exit_rules_are_fixed_with_max_hold() {
        let rules = BreakoutDetector::default().exit_rules();
        assert_eq!(rules.policy, ExitPolicy::Fixed);
        assert_eq!(rules.max_hold_bars, Some(30));
        assert!(!rules.exit_on_opposing_signal);
    }
}
