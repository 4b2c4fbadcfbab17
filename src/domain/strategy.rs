//! Strategy selection: maps `[strategy] name` to a configured detector.
//!
//! Each detector reads its parameters from a section named after it; keys
//! mirror the config struct fields and fall back to the struct defaults.

use std::fmt;
use std::str::FromStr;

use crate::domain::detector::{
    BreakoutConfig, BreakoutConfirmationConfig, BreakoutConfirmationDetector, BreakoutDetector, Detector,
    DivergenceConfig, DivergenceDetector, EmaCrossoverConfig, EmaCrossoverDetector, TrendPullbackConfig,
    TrendPullbackDetector,
};
use crate::domain::error::SigtraderError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrategyKind {
    Breakout,
    BreakoutConfirmation,
    BearishDivergence,
    EmaCrossover,
    TrendPullback,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Breakout,
        StrategyKind::BreakoutConfirmation,
        StrategyKind::BearishDivergence,
        StrategyKind::EmaCrossover,
        StrategyKind::TrendPullback,
    ];

    /// Config name, also the detector's signal tag and its config section.
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Breakout => "breakout",
            StrategyKind::BreakoutConfirmation => "breakout_confirmation",
            StrategyKind::BearishDivergence => "bearish_divergence",
            StrategyKind::EmaCrossover => "ema_crossover",
            StrategyKind::TrendPullback => "trend_pullback",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| SigtraderError::UnknownStrategy { name: s.trim().to_string() })
    }
}

/// Strategy named in `[strategy] name`.
pub fn strategy_kind(config: &dyn ConfigPort) -> Result<StrategyKind, SigtraderError> {
    match config.get_string("strategy", "name") {
        Some(name) if !name.trim().is_empty() => name.parse(),
        _ => Err(SigtraderError::ConfigMissing {
            section: "strategy".to_string(),
            key: "name".to_string(),
        }),
    }
}

/// Build the detector for `kind` with parameters from its config section.
pub fn build_detector(kind: StrategyKind, config: &dyn ConfigPort) -> Box<dyn Detector> {
    match kind {
        StrategyKind::Breakout => Box::new(BreakoutDetector::new(breakout_config(config))),
        StrategyKind::BreakoutConfirmation => {
            Box::new(BreakoutConfirmationDetector::new(breakout_confirmation_config(config)))
        }
        StrategyKind::BearishDivergence => Box::new(DivergenceDetector::new(divergence_config(config))),
        StrategyKind::EmaCrossover => Box::new(EmaCrossoverDetector::new(ema_crossover_config(config))),
        StrategyKind::TrendPullback => Box::new(TrendPullbackDetector::new(trend_pullback_config(config))),
    }
}

/// Resolve `[strategy] name` and build its detector.
pub fn detector_from_config(config: &dyn ConfigPort) -> Result<Box<dyn Detector>, SigtraderError> {
    let kind = strategy_kind(config)?;
    Ok(build_detector(kind, config))
}

pub fn breakout_config(config: &dyn ConfigPort) -> BreakoutConfig {
    let s = StrategyKind::Breakout.as_str();
    let d = BreakoutConfig::default();
    BreakoutConfig {
        lookback: config.get_usize(s, "lookback", d.lookback),
        volume_avg_period: config.get_usize(s, "volume_avg_period", d.volume_avg_period),
        volume_multiplier: config.get_double(s, "volume_multiplier", d.volume_multiplier),
        rsi_period: config.get_usize(s, "rsi_period", d.rsi_period),
        rsi_min: config.get_double(s, "rsi_min", d.rsi_min),
        rsi_max: config.get_double(s, "rsi_max", d.rsi_max),
        stop_loss_pct: config.get_double(s, "stop_loss_pct", d.stop_loss_pct),
        take_profit_pct: config.get_double(s, "take_profit_pct", d.take_profit_pct),
        max_hold_bars: config.get_usize(s, "max_hold_bars", d.max_hold_bars),
    }
}

pub fn breakout_confirmation_config(config: &dyn ConfigPort) -> BreakoutConfirmationConfig {
    let s = StrategyKind::BreakoutConfirmation.as_str();
    let d = BreakoutConfirmationConfig::default();
    BreakoutConfirmationConfig {
        consolidation_bars: config.get_usize(s, "consolidation_bars", d.consolidation_bars),
        atr_period: config.get_usize(s, "atr_period", d.atr_period),
        atr_average_period: config.get_usize(s, "atr_average_period", d.atr_average_period),
        atr_contraction: config.get_double(s, "atr_contraction", d.atr_contraction),
        consolidation_range: config.get_double(s, "consolidation_range", d.consolidation_range),
        consolidation_lookback: config.get_usize(s, "consolidation_lookback", d.consolidation_lookback),
        breakout_lookback: config.get_usize(s, "breakout_lookback", d.breakout_lookback),
        volume_multiplier: config.get_double(s, "volume_multiplier", d.volume_multiplier),
        close_position_min: config.get_double(s, "close_position_min", d.close_position_min),
        confirmation_window: config.get_usize(s, "confirmation_window", d.confirmation_window),
        pullback_tolerance: config.get_double(s, "pullback_tolerance", d.pullback_tolerance),
        pullback_volume_ratio: config.get_double(s, "pullback_volume_ratio", d.pullback_volume_ratio),
        continuation_volume_multiplier: config.get_double(
            s,
            "continuation_volume_multiplier",
            d.continuation_volume_multiplier,
        ),
        sideways_range: config.get_double(s, "sideways_range", d.sideways_range),
        stop_loss_buffer: config.get_double(s, "stop_loss_buffer", d.stop_loss_buffer),
        trailing_atr_multiple: config.get_double(s, "trailing_atr_multiple", d.trailing_atr_multiple),
        max_hold_bars: config.get_usize(s, "max_hold_bars", d.max_hold_bars),
    }
}

pub fn divergence_config(config: &dyn ConfigPort) -> DivergenceConfig {
    let s = StrategyKind::BearishDivergence.as_str();
    let d = DivergenceConfig::default();
    DivergenceConfig {
        peak_order: config.get_usize(s, "peak_order", d.peak_order),
        lookback: config.get_usize(s, "lookback", d.lookback),
        volume_multiplier: config.get_double(s, "volume_multiplier", d.volume_multiplier),
        rsi_period: config.get_usize(s, "rsi_period", d.rsi_period),
        rsi_threshold: config.get_double(s, "rsi_threshold", d.rsi_threshold),
        stop_loss_pct: config.get_double(s, "stop_loss_pct", d.stop_loss_pct),
        take_profit_pct: config.get_double(s, "take_profit_pct", d.take_profit_pct),
        max_hold_bars: config.get_usize(s, "max_hold_bars", d.max_hold_bars),
    }
}

pub fn ema_crossover_config(config: &dyn ConfigPort) -> EmaCrossoverConfig {
    let s = StrategyKind::EmaCrossover.as_str();
    let d = EmaCrossoverConfig::default();
    EmaCrossoverConfig {
        fast_period: config.get_usize(s, "fast_period", d.fast_period),
        slow_period: config.get_usize(s, "slow_period", d.slow_period),
        volume_avg_period: config.get_usize(s, "volume_avg_period", d.volume_avg_period),
        volume_multiplier: config.get_double(s, "volume_multiplier", d.volume_multiplier),
        stop_loss_pct: config.get_double(s, "stop_loss_pct", d.stop_loss_pct),
    }
}

pub fn trend_pullback_config(config: &dyn ConfigPort) -> TrendPullbackConfig {
    let s = StrategyKind::TrendPullback.as_str();
    let d = TrendPullbackConfig::default();
    TrendPullbackConfig {
        fast_period: config.get_usize(s, "fast_period", d.fast_period),
        slow_period: config.get_usize(s, "slow_period", d.slow_period),
        rsi_period: config.get_usize(s, "rsi_period", d.rsi_period),
        rsi_min: config.get_double(s, "rsi_min", d.rsi_min),
        rsi_max: config.get_double(s, "rsi_max", d.rsi_max),
        volume_avg_period: config.get_usize(s, "volume_avg_period", d.volume_avg_period),
        volume_multiplier: config.get_double(s, "volume_multiplier", d.volume_multiplier),
        slope_lookback: config.get_usize(s, "slope_lookback", d.slope_lookback),
        high_lookback: config.get_usize(s, "high_lookback", d.high_lookback),
        pullback_min: config.get_double(s, "pullback_min", d.pullback_min),
        pullback_max: config.get_double(s, "pullback_max", d.pullback_max),
        ema_proximity: config.get_double(s, "ema_proximity", d.ema_proximity),
        stop_buffer: config.get_double(s, "stop_buffer", d.stop_buffer),
        first_target_pct: config.get_double(s, "first_target_pct", d.first_target_pct),
        second_target_pct: config.get_double(s, "second_target_pct", d.second_target_pct),
        tier_fraction: config.get_double(s, "tier_fraction", d.tier_fraction),
        max_hold_bars: config.get_usize(s, "max_hold_bars", d.max_hold_bars),
    }
}
