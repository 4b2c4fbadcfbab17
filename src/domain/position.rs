//! Open positions, their exit state machine, and closed trade legs.
//!
//! A position is evaluated once per bar after entry. Exit checks run in a
//! fixed order: fixed stop, trailing stop, take-profit tiers (ascending),
//! opposing signal, then the time-based exits. Every exit sells a whole
//! number of shares; a leg's fraction is its shares over the original size,
//! so the fractions of one position always sum to 1.0.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::ohlcv::Bar;
use crate::domain::signal::{Side, Signal, TrailingRule};

/// Slack added before flooring a tier's share count, so `1/3 * 99` sells 33.
pub const FRACTION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Stop plus a single full-size target.
    Fixed,
    /// Stop that follows the trade; targets optional.
    Trailing,
    /// Several partial targets with a trailing remainder.
    MultiTier,
}

/// How a detector's signals are managed once filled.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitRules {
    pub policy: ExitPolicy,
    pub exit_on_opposing_signal: bool,
    pub max_hold_bars: Option<usize>,
}

impl Default for ExitRules {
    fn default() -> Self {
        ExitRules {
            policy: ExitPolicy::Fixed,
            exit_on_opposing_signal: false,
            max_hold_bars: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    TakeProfit,
    SignalExit,
    MaxHold,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::TakeProfit => "TAKE_PROFIT",
            ExitReason::SignalExit => "SIGNAL_EXIT",
            ExitReason::MaxHold => "MAX_HOLD",
            ExitReason::EndOfData => "END_OF_DATA",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl From<Side> for PositionSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => PositionSide::Long,
            Side::Sell => PositionSide::Short,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetLevel {
    pub tier: usize,
    pub price: f64,
    pub fraction: f64,
    pub filled: bool,
}

/// Per-bar inputs that are not part of the bar itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarContext {
    pub fast_ema: Option<f64>,
    pub opposing_signal: bool,
    pub last_bar: bool,
}

/// One exit decision: sell `shares` at `level`. `fraction` is `shares` over
/// the original position size.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitEvent {
    pub reason: ExitReason,
    pub tier: Option<usize>,
    pub level: f64,
    pub shares: i64,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: u64,
    pub instrument: String,
    pub strategy: String,
    pub side: PositionSide,
    pub entry_timestamp: NaiveDateTime,
    pub entry_bar: usize,
    pub entry_price: f64,
    pub shares: i64,
    /// Shares not yet sold by an exit leg.
    pub open_shares: i64,
    pub stop_loss: f64,
    pub targets: Vec<TargetLevel>,
    pub trailing: Option<TrailingRule>,
    /// Highest high (long) or lowest low (short) seen since entry.
    pub trailing_reference: f64,
    pub entry_commission: f64,
    pub rules: ExitRules,
}

impl Position {
    /// Build a position from a filled signal. `entry_price` is the fill after slippage.
    pub fn open(
        id: u64,
        signal: &Signal,
        entry_price: f64,
        shares: i64,
        entry_commission: f64,
        rules: &ExitRules,
    ) -> Self {
        let side = PositionSide::from(signal.side);
        let mut targets: Vec<TargetLevel> = signal
            .take_profit
            .iter()
            .map(|t| TargetLevel {
                tier: 0,
                price: t.price,
                fraction: t.fraction,
                filled: false,
            })
            .collect();
        match side {
            PositionSide::Long => targets.sort_by(|a, b| a.price.total_cmp(&b.price)),
            PositionSide::Short => targets.sort_by(|a, b| b.price.total_cmp(&a.price)),
        }
        for (i, t) in targets.iter_mut().enumerate() {
            t.tier = i + 1;
        }

        Position {
            id,
            instrument: signal.instrument.clone(),
            strategy: signal.strategy_tag.clone(),
            side,
            entry_timestamp: signal.timestamp,
            entry_bar: signal.bar_index,
            entry_price,
            shares,
            open_shares: shares,
            stop_loss: signal.stop_loss,
            targets,
            trailing: signal.trailing.clone(),
            trailing_reference: signal.entry_price,
            entry_commission,
            rules: rules.clone(),
        }
    }

    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_closed(&self) -> bool {
        self.open_shares <= 0
    }

    pub fn remaining_shares(&self) -> f64 {
        self.open_shares as f64
    }

    /// Mark-to-market value of the open remainder: entry cost plus
    /// unrealized P&L. Shorts hold their entry notional in escrow, so their
    /// value grows as price falls.
    pub fn market_value(&self, price: f64) -> f64 {
        self.remaining_shares() * self.entry_price + self.unrealized_pnl(price)
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        let qty = self.remaining_shares();
        if self.is_long() {
            qty * (price - self.entry_price)
        } else {
            qty * (self.entry_price - price)
        }
    }

    fn uses_trailing(&self) -> bool {
        self.rules.policy != ExitPolicy::Fixed && self.trailing.is_some()
    }

    fn all_targets_filled(&self) -> bool {
        self.targets.iter().all(|t| t.filled)
    }

    /// Current trailing stop level, if a price-based trail is active.
    pub fn trailing_stop(&self) -> Option<f64> {
        if !self.uses_trailing() {
            return None;
        }
        match self.trailing {
            Some(TrailingRule::HighestHigh { distance }) => Some(if self.is_long() {
                self.stop_loss.max(self.trailing_reference - distance)
            } else {
                self.stop_loss.min(self.trailing_reference + distance)
            }),
            _ => None,
        }
    }

    fn stop_breached(&self, bar: &Bar, level: f64) -> bool {
        if level <= 0.0 {
            return false;
        }
        if self.is_long() {
            bar.low <= level
        } else {
            bar.high >= level
        }
    }

    fn target_reached(&self, bar: &Bar, price: f64) -> bool {
        if self.is_long() {
            bar.high >= price
        } else {
            bar.low <= price
        }
    }

    /// Sell `shares` of the open remainder.
    fn sell(&mut self, reason: ExitReason, tier: Option<usize>, level: f64, shares: i64) -> ExitEvent {
        let shares = shares.clamp(0, self.open_shares);
        self.open_shares -= shares;
        let fraction = if self.shares > 0 {
            shares as f64 / self.shares as f64
        } else {
            0.0
        };
        ExitEvent {
            reason,
            tier,
            level,
            shares,
            fraction,
        }
    }

    fn close_remaining(&mut self, reason: ExitReason, level: f64) -> ExitEvent {
        self.sell(reason, None, level, self.open_shares)
    }

    /// Whole shares a tier sells. The last tier of a ladder whose fractions
    /// cover the whole position takes everything still open.
    fn tier_shares(&self, index: usize) -> i64 {
        let is_last = self.targets.iter().enumerate().all(|(j, t)| j == index || t.filled);
        let covered: f64 = self.targets.iter().map(|t| t.fraction).sum();
        if is_last && covered >= 1.0 - FRACTION_EPSILON {
            return self.open_shares;
        }
        let planned = (self.shares as f64 * self.targets[index].fraction + FRACTION_EPSILON).floor() as i64;
        planned.min(self.open_shares)
    }

    /// Advance the position by one bar and return the exits it triggers.
    ///
    /// `bar_index` is the bar's position in the instrument's full series.
    pub fn on_bar(&mut self, bar: &Bar, bar_index: usize, ctx: &BarContext) -> Vec<ExitEvent> {
        let mut events = Vec::new();
        if self.is_closed() {
            return events;
        }

        // (a) fixed stop, conservative against any target in the same bar
        if self.stop_breached(bar, self.stop_loss) {
            events.push(self.close_remaining(ExitReason::StopLoss, self.stop_loss));
            return events;
        }

        // (b) trailing stop
        if self.uses_trailing() {
            match self.trailing {
                Some(TrailingRule::HighestHigh { .. }) => {
                    self.trailing_reference = if self.is_long() {
                        self.trailing_reference.max(bar.high)
                    } else {
                        self.trailing_reference.min(bar.low)
                    };
                    if let Some(level) = self.trailing_stop() {
                        if self.stop_breached(bar, level) {
                            events.push(self.close_remaining(ExitReason::TrailingStop, level));
                            return events;
                        }
                    }
                }
                Some(TrailingRule::CloseBelowFastEma) => {
                    if self.all_targets_filled() {
                        if let Some(ema) = ctx.fast_ema {
                            let crossed = if self.is_long() {
                                bar.close < ema
                            } else {
                                bar.close > ema
                            };
                            if crossed {
                                events.push(self.close_remaining(ExitReason::TrailingStop, bar.close));
                                return events;
                            }
                        }
                    }
                }
                None => {}
            }
        }

        // (c) tiers in ascending order, each once
        for i in 0..self.targets.len() {
            let target = self.targets[i].clone();
            if target.filled || !self.target_reached(bar, target.price) {
                continue;
            }
            let shares = self.tier_shares(i);
            self.targets[i].filled = true;
            if shares == 0 {
                continue;
            }
            events.push(self.sell(ExitReason::TakeProfit, Some(target.tier), target.price, shares));
            if self.is_closed() {
                return events;
            }
        }

        // (d) opposing signal
        if self.rules.exit_on_opposing_signal && ctx.opposing_signal {
            events.push(self.close_remaining(ExitReason::SignalExit, bar.close));
            return events;
        }

        // (e) time-based exits
        let held = bar_index.saturating_sub(self.entry_bar);
        if self.rules.max_hold_bars.is_some_and(|max| held >= max) {
            events.push(self.close_remaining(ExitReason::MaxHold, bar.close));
        } else if ctx.last_bar {
            events.push(self.close_remaining(ExitReason::EndOfData, bar.close));
        }

        events
    }
}

/// A closed slice of a position: one row per exit event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub position_id: u64,
    pub instrument: String,
    pub strategy: String,
    pub side: PositionSide,
    pub entry_timestamp: NaiveDateTime,
    pub exit_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub exit_level: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub fraction: f64,
    pub exit_reason: ExitReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<usize>,
    pub pnl: f64,
    pub return_pct: f64,
    pub hold_bars: usize,
}

impl Trade {
    pub fn hold_days(&self) -> f64 {
        (self.exit_timestamp - self.entry_timestamp).num_seconds() as f64 / 86_400.0
    }
}
