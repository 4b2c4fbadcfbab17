//! Trade execution and fill simulation.
//!
//! Implements entry sizing, slippage, commissions and the settlement of exit
//! legs against the capital ledger. Rates are fractions (0.001 = 0.1%).

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use super::ohlcv::Bar;
use super::portfolio::Portfolio;
use super::position::{BarContext, ExitEvent, ExitRules, Position, PositionSide, Trade};
use super::signal::{Side, Signal};

/// Cost model and sizing parameters shared by the simulator and the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub position_fraction: f64,
    pub commission_rate: f64,
    pub commission_per_trade: f64,
    pub slippage_rate: f64,
    pub allow_shorting: bool,
    /// Signals with fewer bars than this after them are not simulated.
    pub min_future_bars: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            position_fraction: 0.15,
            commission_rate: 0.0015,
            commission_per_trade: 0.0,
            slippage_rate: 0.001,
            allow_shorting: false,
            min_future_bars: 5,
        }
    }
}

/// Calculate commission: flat_fee + trade_value * rate.
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + trade_value * config.commission_rate
}

/// Long entry (buy): execution_price = market_price * (1 + rate)
pub fn apply_slippage_long_entry(market_price: f64, slippage_rate: f64) -> f64 {
    market_price * (1.0 + slippage_rate)
}

/// Short entry (sell short): execution_price = market_price * (1 - rate)
pub fn apply_slippage_short_entry(market_price: f64, slippage_rate: f64) -> f64 {
    market_price * (1.0 - slippage_rate)
}

/// Long exit (sell): execution_price = market_price * (1 - rate)
pub fn apply_slippage_long_exit(market_price: f64, slippage_rate: f64) -> f64 {
    market_price * (1.0 - slippage_rate)
}

/// Short exit (buy to cover): execution_price = market_price * (1 + rate)
pub fn apply_slippage_short_exit(market_price: f64, slippage_rate: f64) -> f64 {
    market_price * (1.0 + slippage_rate)
}

/// Whole shares affordable with `capital * fraction` at `price`.
pub fn size_position(capital: f64, fraction: f64, price: f64) -> i64 {
    if price <= 0.0 || capital <= 0.0 || fraction <= 0.0 {
        return 0;
    }
    (capital * fraction / price).floor() as i64
}

/// Why a detected signal did not become a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    ZeroShares,
    InsufficientCapital,
    PositionOpen,
    MaxPositions,
    InsufficientFutureBars,
    ShortingDisabled,
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        position_id: u64,
        shares: i64,
        execution_price: f64,
        cost: f64,
        commission: f64,
    },
    Rejected(RejectReason),
}

/// Open a position for `signal` at its entry price.
///
/// Sizing uses current cash times `position_fraction`. Cost plus commission
/// is deducted from cash for both directions; for shorts the notional is held
/// in escrow until the position is covered.
pub fn enter_position(
    portfolio: &mut Portfolio,
    signal: &Signal,
    rules: &ExitRules,
    config: &ExecutionConfig,
) -> EntryResult {
    if signal.side == Side::Sell && !config.allow_shorting {
        return EntryResult::Rejected(RejectReason::ShortingDisabled);
    }

    let execution_price = match signal.side {
        Side::Buy => apply_slippage_long_entry(signal.entry_price, config.slippage_rate),
        Side::Sell => apply_slippage_short_entry(signal.entry_price, config.slippage_rate),
    };

    let shares = size_position(portfolio.cash, config.position_fraction, execution_price);
    if shares <= 0 {
        return EntryResult::Rejected(RejectReason::ZeroShares);
    }

    let cost = shares as f64 * execution_price;
    let commission = calculate_commission(cost, config);
    if cost + commission > portfolio.cash {
        return EntryResult::Rejected(RejectReason::InsufficientCapital);
    }

    portfolio.cash -= cost + commission;
    let position_id = portfolio.allocate_position_id();
    let position = Position::open(position_id, signal, execution_price, shares, commission, rules);
    portfolio.add_position(position);

    debug!(
        instrument = %signal.instrument,
        strategy = %signal.strategy_tag,
        position_id,
        shares,
        price = execution_price,
        "entered position"
    );

    EntryResult::Entered {
        position_id,
        shares,
        execution_price,
        cost,
        commission,
    }
}

/// Settle one exit leg of `position` and book it in the ledger.
///
/// The leg's share of the entry commission is charged to it, so the legs of a
/// position add up to its round-trip P&L.
pub fn settle_exit(
    portfolio: &mut Portfolio,
    position: &Position,
    event: &ExitEvent,
    exit_timestamp: NaiveDateTime,
    exit_bar: usize,
    config: &ExecutionConfig,
) -> Trade {
    let exit_price = match position.side {
        PositionSide::Long => apply_slippage_long_exit(event.level, config.slippage_rate),
        PositionSide::Short => apply_slippage_short_exit(event.level, config.slippage_rate),
    };

    let quantity = event.shares as f64;
    let entry_notional = quantity * position.entry_price;
    let exit_value = quantity * exit_price;
    let exit_commission = calculate_commission(exit_value, config);
    let entry_commission = position.entry_commission * event.fraction;

    let price_pnl = match position.side {
        PositionSide::Long => exit_value - entry_notional,
        PositionSide::Short => entry_notional - exit_value,
    };
    let pnl = price_pnl - entry_commission - exit_commission;

    match position.side {
        PositionSide::Long => portfolio.cash += exit_value - exit_commission,
        // Return the escrowed notional and settle the price difference.
        PositionSide::Short => {
            portfolio.cash += entry_notional + (entry_notional - exit_value) - exit_commission
        }
    }

    let return_pct = if entry_notional > 0.0 {
        pnl / entry_notional * 100.0
    } else {
        0.0
    };

    let trade = Trade {
        position_id: position.id,
        instrument: position.instrument.clone(),
        strategy: position.strategy.clone(),
        side: position.side,
        entry_timestamp: position.entry_timestamp,
        exit_timestamp,
        entry_price: position.entry_price,
        exit_level: event.level,
        exit_price,
        quantity,
        fraction: event.fraction,
        exit_reason: event.reason,
        tier: event.tier,
        pnl,
        return_pct,
        hold_bars: exit_bar.saturating_sub(position.entry_bar),
    };

    debug!(
        instrument = %trade.instrument,
        position_id = trade.position_id,
        reason = %trade.exit_reason,
        shares = event.shares,
        fraction = trade.fraction,
        pnl = trade.pnl,
        "exit leg"
    );

    portfolio.record_trade(trade.clone());
    trade
}

/// Run one bar of exit checks for the open position in `instrument`.
///
/// The position is taken out of the registry, advanced, its legs settled,
/// and put back only if some fraction remains.
pub fn process_position_bar(
    portfolio: &mut Portfolio,
    instrument: &str,
    bar: &Bar,
    bar_index: usize,
    ctx: &BarContext,
    config: &ExecutionConfig,
) -> Vec<Trade> {
    let Some(mut position) = portfolio.remove_position(instrument) else {
        return Vec::new();
    };

    let events = position.on_bar(bar, bar_index, ctx);
    let trades = events
        .iter()
        .map(|event| settle_exit(portfolio, &position, event, bar.timestamp, bar_index, config))
        .collect();

    if !position.is_closed() {
        portfolio.add_position(position);
    }
    trades
}
