//! Capital ledger, open position registry and equity tracking.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use super::execution::RejectReason;
use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub total_equity: f64,
    pub cash: f64,
    pub open_position_count: usize,
}

/// A signal that was detected but not traded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedSignal {
    pub instrument: String,
    pub timestamp: NaiveDateTime,
    pub strategy: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    /// Keyed by instrument; at most one open position per instrument.
    pub positions: BTreeMap<String, Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub rejected: Vec<RejectedSignal>,
    next_position_id: u64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            rejected: Vec::new(),
            next_position_id: 1,
        }
    }

    pub fn allocate_position_id(&mut self) -> u64 {
        let id = self.next_position_id;
        self.next_position_id += 1;
        id
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.instrument.clone(), position);
    }

    pub fn get_position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    pub fn has_position(&self, instrument: &str) -> bool {
        self.positions.contains_key(instrument)
    }

    pub fn remove_position(&mut self, instrument: &str) -> Option<Position> {
        self.positions.remove(instrument)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn record_rejection(&mut self, rejection: RejectedSignal) {
        self.rejected.push(rejection);
    }

    /// Cash plus the mark-to-market value of every open position. Positions
    /// without a price in `price_map` are valued at their entry price.
    pub fn total_equity(&self, price_map: &BTreeMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = price_map
                    .get(&pos.instrument)
                    .copied()
                    .unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, price_map: &BTreeMap<String, f64>) {
        let total_equity = self.total_equity(price_map);
        self.equity_curve.push(EquityPoint {
            timestamp,
            total_equity,
            cash: self.cash,
            open_position_count: self.positions.len(),
        });
    }
}
