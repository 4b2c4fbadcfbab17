//! Stand-alone simulation of one signal against the bars that follow it.
//!
//! Uses the same entry, exit and settlement code as the engine but against a
//! private ledger, so a signal's outcome can be inspected without running a
//! full backtest.

use std::collections::BTreeSet;

use super::execution::{enter_position, process_position_bar, EntryResult, ExecutionConfig, RejectReason};
use super::indicator::{value_at, IndicatorSeries};
use super::ohlcv::Bar;
use super::portfolio::Portfolio;
use super::position::{BarContext, ExitRules, Trade};
use super::signal::{Side, Signal};

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    /// Exit legs in the order they were settled.
    Simulated(Vec<Trade>),
    Skipped(RejectReason),
}

/// Bar indices carrying a signal of the side opposite to `side`.
pub fn opposing_bars(signals: &[Signal], side: Side) -> BTreeSet<usize> {
    signals
        .iter()
        .filter(|s| s.side == side.opposite())
        .map(|s| s.bar_index)
        .collect()
}

/// Number of bars after `bar_index` in a series of `len` bars.
pub fn future_bars(len: usize, bar_index: usize) -> usize {
    len.saturating_sub(bar_index + 1)
}

/// Simulate `signal` with `capital` starting cash.
///
/// `bars` and `indicators` are the full series the signal was detected on;
/// `opposing` holds the bar indices of opposite-side signals for the same
/// instrument.
pub fn simulate_signal(
    signal: &Signal,
    bars: &[Bar],
    indicators: &IndicatorSeries,
    opposing: &BTreeSet<usize>,
    rules: &ExitRules,
    config: &ExecutionConfig,
    capital: f64,
) -> SimulationOutcome {
    if signal.bar_index >= bars.len() || future_bars(bars.len(), signal.bar_index) < config.min_future_bars.max(1) {
        return SimulationOutcome::Skipped(RejectReason::InsufficientFutureBars);
    }

    let mut ledger = Portfolio::new(capital);
    if let EntryResult::Rejected(reason) = enter_position(&mut ledger, signal, rules, config) {
        return SimulationOutcome::Skipped(reason);
    }

    let last = bars.len() - 1;
    let mut trades = Vec::new();
    for (j, bar) in bars.iter().enumerate().skip(signal.bar_index + 1) {
        let ctx = BarContext {
            fast_ema: value_at(&indicators.ema_fast, j),
            opposing_signal: opposing.contains(&j),
            last_bar: j == last,
        };
        trades.extend(process_position_bar(&mut ledger, &signal.instrument, bar, j, &ctx, config));
        if !ledger.has_position(&signal.instrument) {
            break;
        }
    }

    SimulationOutcome::Simulated(trades)
}

/// Position return in percent: legs weighted by the fraction they closed.
pub fn blended_return_pct(legs: &[Trade]) -> f64 {
    legs.iter().map(|t| t.fraction * t.return_pct).sum()
}
