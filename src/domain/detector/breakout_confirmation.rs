//! Two-phase breakout: a volume breakout out of a consolidation, then a
//! confirming bar within a short window.
//!
//! Outstanding breakouts are kept as an ordered list of [`PendingSetup`]
//! values. Each bar builds the next list by dropping setups that expired or
//! confirmed, so a setup is resolved at most once.

use chrono::NaiveDateTime;

use crate::domain::detector::{volume_score, Detector, PriceColumns};
use crate::domain::indicator::rolling::{highest, lowest, mean};
use crate::domain::indicator::{value_at, IndicatorSeries, IndicatorSettings};
use crate::domain::ohlcv::Bar;
use crate::domain::position::{ExitPolicy, ExitRules};
use crate::domain::signal::{Side, Signal, TrailingRule};

#[derive(Debug, Clone, PartialEq)]
pub struct BreakoutConfirmationConfig {
    pub consolidation_bars: usize,
    pub atr_period: usize,
    pub atr_average_period: usize,
    /// Current ATR must be at most this fraction of its recent average.
    pub atr_contraction: f64,
    /// Max (high - low) / mean close over the consolidation window.
    pub consolidation_range: f64,
    /// Bars before a breakout in which a consolidation must have appeared.
    pub consolidation_lookback: usize,
    pub breakout_lookback: usize,
    pub volume_multiplier: f64,
    pub close_position_min: f64,
    pub confirmation_window: usize,
    pub pullback_tolerance: f64,
    pub pullback_volume_ratio: f64,
    pub continuation_volume_multiplier: f64,
    pub sideways_range: f64,
    pub stop_loss_buffer: f64,
    pub trailing_atr_multiple: f64,
    pub max_hold_bars: usize,
}

impl Default for BreakoutConfirmationConfig {
    fn default() -> Self {
        BreakoutConfirmationConfig {
            consolidation_bars: 10,
            atr_period: 14,
            atr_average_period: 20,
            atr_contraction: 0.7,
            consolidation_range: 0.05,
            consolidation_lookback: 20,
            breakout_lookback: 20,
            volume_multiplier: 2.0,
            close_position_min: 0.7,
            confirmation_window: 5,
            pullback_tolerance: 0.02,
            pullback_volume_ratio: 1.0,
            continuation_volume_multiplier: 1.5,
            sideways_range: 0.03,
            stop_loss_buffer: 0.02,
            trailing_atr_multiple: 2.0,
            max_hold_bars: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationKind {
    Pullback,
    Continuation,
    Sideways,
}

impl ConfirmationKind {
    pub fn code(self) -> f64 {
        match self {
            ConfirmationKind::Pullback => 1.0,
            ConfirmationKind::Continuation => 2.0,
            ConfirmationKind::Sideways => 3.0,
        }
    }

    fn base_score(self) -> u32 {
        match self {
            ConfirmationKind::Pullback => 40,
            ConfirmationKind::Continuation => 35,
            ConfirmationKind::Sideways => 30,
        }
    }
}

/// A breakout waiting for its confirmation bar.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSetup {
    pub breakout_index: usize,
    pub breakout_timestamp: NaiveDateTime,
    /// Close of the breakout bar.
    pub breakout_level: f64,
    pub breakout_high: f64,
    pub breakout_volume_ratio: f64,
    /// Last bar on which this setup may still confirm.
    pub expires_at_bar: usize,
}

/// Lifecycle of setups during a scan, in bar order.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupEvent {
    Created { breakout_index: usize },
    Confirmed { breakout_index: usize, bar_index: usize, kind: ConfirmationKind },
    Expired { breakout_index: usize, bar_index: usize },
}

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub signals: Vec<Signal>,
    pub events: Vec<SetupEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct BreakoutConfirmationDetector {
    pub config: BreakoutConfirmationConfig,
}

impl BreakoutConfirmationDetector {
    pub fn new(config: BreakoutConfirmationConfig) -> Self {
        Self { config }
    }

    /// ATR contracted against its average and the last `consolidation_bars`
    /// span strictly less than `consolidation_range` of their mean close.
    fn is_consolidation(&self, cols: &PriceColumns, atr: &[Option<f64>], i: usize) -> bool {
        let cfg = &self.config;
        if cfg.consolidation_bars == 0 || cfg.atr_average_period == 0 || i + 1 < cfg.atr_average_period.max(cfg.consolidation_bars) {
            return false;
        }
        let Some(current) = value_at(atr, i) else {
            return false;
        };
        let window: Option<Vec<f64>> = atr[i + 1 - cfg.atr_average_period..=i].iter().copied().collect();
        let Some(window) = window else {
            return false;
        };
        let atr_avg = window.iter().sum::<f64>() / window.len() as f64;
        if current > atr_avg * cfg.atr_contraction {
            return false;
        }

        let from = i + 1 - cfg.consolidation_bars;
        let (Some(hi), Some(lo), Some(avg_close)) = (
            highest(&cols.highs, from, i + 1),
            lowest(&cols.lows, from, i + 1),
            mean(&cols.closes, from, i + 1),
        ) else {
            return false;
        };
        avg_close > 0.0 && (hi - lo) / avg_close < cfg.consolidation_range
    }

    fn breakout_at(&self, bars: &[Bar], cols: &PriceColumns, i: usize) -> Option<PendingSetup> {
        let cfg = &self.config;
        if i < cfg.breakout_lookback {
            return None;
        }
        let bar = &bars[i];
        let prior_high = highest(&cols.highs, i - cfg.breakout_lookback, i)?;
        let prior_volume = mean(&cols.volumes, i - cfg.breakout_lookback, i)?;
        if bar.close <= prior_high || prior_volume <= 0.0 {
            return None;
        }
        let volume_ratio = bar.volume / prior_volume;
        if volume_ratio < cfg.volume_multiplier || bar.close_position() < cfg.close_position_min {
            return None;
        }
        Some(PendingSetup {
            breakout_index: i,
            breakout_timestamp: bar.timestamp,
            breakout_level: bar.close,
            breakout_high: bar.high,
            breakout_volume_ratio: volume_ratio,
            expires_at_bar: i + cfg.confirmation_window,
        })
    }

    fn classify(&self, setup: &PendingSetup, bars: &[Bar], cols: &PriceColumns, i: usize) -> Option<ConfirmationKind> {
        let cfg = &self.config;
        if i <= setup.breakout_index {
            return None;
        }
        let bar = &bars[i];
        let level = setup.breakout_level;
        let from = setup.breakout_index;
        let period_volume = mean(&cols.volumes, from, i + 1)?;

        if bar.low <= level * (1.0 + cfg.pullback_tolerance)
            && bar.close > level * (1.0 - cfg.pullback_tolerance)
            && bar.volume < period_volume * cfg.pullback_volume_ratio
        {
            return Some(ConfirmationKind::Pullback);
        }

        if bar.close > setup.breakout_high && bar.volume >= period_volume * cfg.continuation_volume_multiplier {
            return Some(ConfirmationKind::Continuation);
        }

        if bar.low > level {
            let hi = highest(&cols.highs, from, i + 1)?;
            let lo = lowest(&cols.lows, from, i + 1)?;
            let avg_close = mean(&cols.closes, from, i + 1)?;
            if avg_close > 0.0 && (hi - lo) / avg_close < cfg.sideways_range {
                return Some(ConfirmationKind::Sideways);
            }
        }

        None
    }

    /// Full scan returning signals plus the setup lifecycle.
    ///
    /// A breakout at bar `i` qualifies when any bar in
    /// `i - consolidation_lookback ..= i` closed a consolidation window; the
    /// breakout bar itself counts toward that range.
    pub fn scan(&self, instrument: &str, bars: &[Bar], indicators: &IndicatorSeries) -> ScanOutcome {
        let cfg = &self.config;
        let cols = PriceColumns::from_bars(bars);

        let mut outcome = ScanOutcome::default();
        let mut consolidation = vec![false; bars.len()];
        let mut pending: Vec<PendingSetup> = Vec::new();

        for i in 0..bars.len() {
            consolidation[i] = self.is_consolidation(&cols, &indicators.atr, i);

            let mut confirmed_this_bar = false;
            let mut next = Vec::with_capacity(pending.len() + 1);
            for setup in pending {
                if i > setup.expires_at_bar {
                    outcome.events.push(SetupEvent::Expired {
                        breakout_index: setup.breakout_index,
                        bar_index: i,
                    });
                    continue;
                }
                if !confirmed_this_bar {
                    if let Some(kind) = self.classify(&setup, bars, &cols, i) {
                        confirmed_this_bar = true;
                        outcome.events.push(SetupEvent::Confirmed {
                            breakout_index: setup.breakout_index,
                            bar_index: i,
                            kind,
                        });
                        outcome.signals.push(self.confirmation_signal(instrument, bars, indicators, &setup, i, kind));
                        continue;
                    }
                }
                next.push(setup);
            }
            pending = next;

            let recent_from = i.saturating_sub(cfg.consolidation_lookback);
            if consolidation[recent_from..=i].iter().any(|&c| c) {
                if let Some(setup) = self.breakout_at(bars, &cols, i) {
                    outcome.events.push(SetupEvent::Created {
                        breakout_index: setup.breakout_index,
                    });
                    pending.push(setup);
                }
            }
        }

        outcome
    }

    fn confirmation_signal(&self, instrument: &str, bars: &[Bar], indicators: &IndicatorSeries, setup: &PendingSetup, i: usize, kind: ConfirmationKind) -> Signal {
        let cfg = &self.config;
        let bar = &bars[i];
        let mut signal = Signal::new(
            instrument,
            bar.timestamp,
            i,
            self.name(),
            Side::Buy,
            bar.close,
            setup.breakout_level * (1.0 - cfg.stop_loss_buffer),
        )
        .with_metric("confirmation_type", kind.code())
        .with_metric("breakout_level", setup.breakout_level)
        .with_metric("breakout_bar", setup.breakout_index as f64)
        .with_metric("bars_since_breakout", (i - setup.breakout_index) as f64)
        .with_metric("breakout_volume_ratio", setup.breakout_volume_ratio);

        if let Some(atr) = value_at(&indicators.atr, i) {
            signal = signal
                .with_trailing(TrailingRule::HighestHigh {
                    distance: atr * cfg.trailing_atr_multiple,
                })
                .with_metric("atr", atr);
        }
        if let Some(avg) = value_at(&indicators.volume_avg, i).filter(|v| *v > 0.0) {
            signal = signal.with_metric("volume_ratio", bar.volume / avg);
        }

        signal.with_confidence(kind.base_score() + volume_score(setup.breakout_volume_ratio))
    }
}

impl Detector for BreakoutConfirmationDetector {
    fn name(&self) -> &'static str {
        "breakout_confirmation"
    }

    fn indicator_settings(&self) -> IndicatorSettings {
        IndicatorSettings {
            atr: self.config.atr_period,
            ..IndicatorSettings::default()
        }
    }

    fn exit_rules(&self) -> ExitRules {
        ExitRules {
            policy: ExitPolicy::Trailing,
            exit_on_opposing_signal: false,
            max_hold_bars: Some(self.config.max_hold_bars),
        }
    }

    fn detect_with(&self, instrument: &str, bars: &[Bar], indicators: &IndicatorSeries) -> Vec<Signal> {
        self.scan(instrument, bars, indicators).signals
    }
}
