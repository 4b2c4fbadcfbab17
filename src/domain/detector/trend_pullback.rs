//! Bounce out of a shallow pullback inside an established uptrend.

use crate::domain::detector::{volume_score, Detector, PriceColumns};
use crate::domain::indicator::rolling::highest;
use crate::domain::indicator::{value_at, IndicatorSeries, IndicatorSettings};
use crate::domain::ohlcv::Bar;
use crate::domain::position::{ExitPolicy, ExitRules};
use crate::domain::signal::{Side, Signal, TrailingRule};

#[derive(Debug, Clone, PartialEq)]
pub struct TrendPullbackConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub rsi_period: usize,
    pub rsi_min: f64,
    pub rsi_max: f64,
    pub volume_avg_period: usize,
    pub volume_multiplier: f64,
    /// Fast EMA must have risen over this many bars.
    pub slope_lookback: usize,
    pub high_lookback: usize,
    pub pullback_min: f64,
    pub pullback_max: f64,
    /// Max distance from either EMA, as a fraction of price.
    pub ema_proximity: f64,
    pub stop_buffer: f64,
    pub first_target_pct: f64,
    pub second_target_pct: f64,
    pub tier_fraction: f64,
    pub max_hold_bars: usize,
}

impl Default for TrendPullbackConfig {
    fn default() -> Self {
        TrendPullbackConfig {
            fast_period: 20,
            slow_period: 50,
            rsi_period: 14,
            rsi_min: 40.0,
            rsi_max: 60.0,
            volume_avg_period: 20,
            volume_multiplier: 1.5,
            slope_lookback: 5,
            high_lookback: 20,
            pullback_min: 0.03,
            pullback_max: 0.08,
            ema_proximity: 0.03,
            stop_buffer: 0.01,
            first_target_pct: 0.05,
            second_target_pct: 0.10,
            tier_fraction: 1.0 / 3.0,
            max_hold_bars: 60,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrendPullbackDetector {
    pub config: TrendPullbackConfig,
}

impl TrendPullbackDetector {
    pub fn new(config: TrendPullbackConfig) -> Self {
        Self { config }
    }

    fn is_uptrend(&self, close: f64, fast: f64, slow: f64, fast_before: f64) -> bool {
        fast > slow && close >= slow && fast > fast_before
    }

    /// Retracement from the prior high, if within the band and near an EMA.
    fn pullback_depth(&self, close: f64, recent_high: f64, fast: f64, slow: f64) -> Option<f64> {
        let cfg = &self.config;
        if recent_high <= 0.0 || close <= 0.0 {
            return None;
        }
        let depth = (recent_high - close) / recent_high;
        if depth < cfg.pullback_min || depth > cfg.pullback_max {
            return None;
        }
        let near_fast = (close - fast).abs() / close <= cfg.ema_proximity;
        let near_slow = (close - slow).abs() / close <= cfg.ema_proximity;
        (near_fast || near_slow).then_some(depth)
    }
}

impl Detector for TrendPullbackDetector {
    fn name(&self) -> &'static str {
        "trend_pullback"
    }

    fn indicator_settings(&self) -> IndicatorSettings {
        IndicatorSettings {
            ema_fast: self.config.fast_period,
            ema_slow: self.config.slow_period,
            rsi: self.config.rsi_period,
            volume_avg: self.config.volume_avg_period,
            ..IndicatorSettings::default()
        }
    }

    fn exit_rules(&self) -> ExitRules {
        ExitRules {
            policy: ExitPolicy::MultiTier,
            exit_on_opposing_signal: false,
            max_hold_bars: Some(self.config.max_hold_bars),
        }
    }

    fn detect_with(&self, instrument: &str, bars: &[Bar], indicators: &IndicatorSeries) -> Vec<Signal> {
        let cfg = &self.config;
        let cols = PriceColumns::from_bars(bars);
        let start = cfg.high_lookback.max(cfg.slope_lookback).max(1);
        let mut signals = Vec::new();

        for i in start..bars.len() {
            let (Some(fast), Some(slow), Some(fast_before), Some(rsi), Some(volume_avg)) = (
                value_at(&indicators.ema_fast, i),
                value_at(&indicators.ema_slow, i),
                value_at(&indicators.ema_fast, i - cfg.slope_lookback),
                value_at(&indicators.rsi, i),
                value_at(&indicators.volume_avg, i),
            ) else {
                continue;
            };
            let bar = &bars[i];
            if !self.is_uptrend(bar.close, fast, slow, fast_before) {
                continue;
            }
            let Some(recent_high) = highest(&cols.highs, i - cfg.high_lookback, i) else {
                continue;
            };
            let Some(depth) = self.pullback_depth(bar.close, recent_high, fast, slow) else {
                continue;
            };
            if rsi < cfg.rsi_min || rsi > cfg.rsi_max || volume_avg <= 0.0 {
                continue;
            }
            let volume_ratio = bar.volume / volume_avg;
            let bounced = bar.is_green() && volume_ratio >= cfg.volume_multiplier && bar.close > cols.closes[i - 1];
            if !bounced {
                continue;
            }

            let entry = bar.close;
            let ema_points = if entry >= fast { 20 } else { 10 };
            let signal = Signal::new(
                instrument,
                bar.timestamp,
                i,
                self.name(),
                Side::Buy,
                entry,
                slow * (1.0 - cfg.stop_buffer),
            )
            .with_target(entry * (1.0 + cfg.first_target_pct), cfg.tier_fraction)
            .with_target(entry * (1.0 + cfg.second_target_pct), cfg.tier_fraction)
            .with_trailing(TrailingRule::CloseBelowFastEma)
            .with_metric("ema_fast", fast)
            .with_metric("ema_slow", slow)
            .with_metric("rsi", rsi)
            .with_metric("volume_ratio", volume_ratio)
            .with_metric("pullback_pct", depth * 100.0)
            .with_metric("recent_high", recent_high)
            .with_confidence(40 + volume_score(volume_ratio) + ema_points)
            .with_risk_reward();

            signals.push(signal);
        }

        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detector::test_support::bars_from;

    fn pullback_bars() -> Vec<Bar> {
        let mut rows = vec![(104.0, 105.0, 103.0, 104.0, 1_000.0); 24];
        rows.push((99.0, 99.5, 98.5, 98.8, 1_000.0));
        rows.push((98.5, 100.5, 98.4, 100.0, 2_000.0));
        bars_from(&rows)
    }

    fn trend_indicators(bars: &[Bar]) -> IndicatorSeries {
        let n = bars.len();
        let mut indicators = IndicatorSeries::compute(bars, &IndicatorSettings::default());
        indicators.ema_fast = (0..n).map(|i| Some(98.0 + i as f64 * 0.06)).collect();
        indicators.ema_slow = vec![Some(97.0); n];
        indicators.rsi = vec![Some(50.0); n];
        indicators.volume_avg = vec![Some(1_000.0); n];
        indicators
    }

    #[test]
    fn bounce_in_uptrend_emits_tiered_signal() {
        let bars = pullback_bars();
        let indicators = trend_indicators(&bars);
        let signals = TrendPullbackDetector::default().detect_with("TP", &bars, &indicators);

        assert_eq!(signals.len(), 1);
        let s = &signals[0];
        assert_eq!(s.bar_index, 25);
        assert!((s.stop_loss - 97.0 * 0.99).abs() < 1e-9);
        assert_eq!(s.take_profit.len(), 2);
        assert!((s.take_profit[0].price - 105.0).abs() < 1e-9);
        assert!((s.take_profit[1].price - 110.0).abs() < 1e-9);
        assert!((s.take_profit[0].fraction - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(s.trailing, Some(TrailingRule::CloseBelowFastEma));
        let expected_depth = (105.0 - 100.0) / 105.0 * 100.0;
        assert!((s.supporting_metrics["pullback_pct"] - expected_depth).abs() < 1e-9);
    }

    #[test]
    fn rsi_outside_band_blocks() {
        let bars = pullback_bars();
        let mut indicators = trend_indicators(&bars);
        indicators.rsi[25] = Some(65.0);
        assert!(TrendPullbackDetector::default().detect_with("TP", &bars, &indicators).is_empty());
    }

    #[test]
    fn flat_fast_ema_is_not_a_trend() {
        let bars = pullback_bars();
        let mut indicators = trend_indicators(&bars);
        indicators.ema_fast = vec![Some(99.5); bars.len()];
        assert!(TrendPullbackDetector::default().detect_with("TP", &bars, &indicators).is_empty());
    }

    #[test]
    fn too_deep_pullback_is_ignored() {
        let mut bars = pullback_bars();
        for bar in bars.iter_mut().take(24) {
            bar.high = 115.0;
        }
        let indicators = trend_indicators(&bars);
        assert!(TrendPullbackDetector::default().detect_with("TP", &bars, &indicators).is_empty());
    }

    #[test]
    fn weak_bounce_volume_is_ignored() {
        let mut bars = pullback_bars();
        bars[25].volume = 1_200.0;
        let indicators = trend_indicators(&bars);
        assert!(TrendPullbackDetector::default().detect_with("TP", &bars, &indicators).is_empty());
    }

    #[test]
    fn multi_tier_exit_rules() {
        let rules = TrendPullbackDetector::default().exit_rules();
        assert_eq!(rules.policy, ExitPolicy::MultiTier);
        assert_eq!(rules.max_hold_bars, Some(60));
    }
}
