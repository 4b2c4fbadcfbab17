//! Signal records emitted by pattern detectors.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// One take-profit level and the share of the original position it closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitTier {
    pub price: f64,
    pub fraction: f64,
}

/// Reference used to trail the stop of an open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrailingRule {
    /// Stop follows the best extreme since entry at a fixed price distance.
    HighestHigh { distance: f64 },
    /// Once every tier has filled, the rest exits on a close through the fast EMA.
    CloseBelowFastEma,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub instrument: String,
    pub timestamp: NaiveDateTime,
    pub bar_index: usize,
    pub strategy_tag: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: Vec<TakeProfitTier>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trailing: Option<TrailingRule>,
    pub confidence_score: u8,
    pub supporting_metrics: BTreeMap<String, f64>,
}

impl Signal {
    pub fn new(
        instrument: &str,
        timestamp: NaiveDateTime,
        bar_index: usize,
        strategy_tag: &str,
        side: Side,
        entry_price: f64,
        stop_loss: f64,
    ) -> Self {
        Signal {
            instrument: instrument.to_string(),
            timestamp,
            bar_index,
            strategy_tag: strategy_tag.to_string(),
            side,
            entry_price,
            stop_loss,
            take_profit: Vec::new(),
            trailing: None,
            confidence_score: 0,
            supporting_metrics: BTreeMap::new(),
        }
    }

    pub fn with_target(mut self, price: f64, fraction: f64) -> Self {
        self.take_profit.push(TakeProfitTier { price, fraction });
        self
    }

    pub fn with_trailing(mut self, rule: TrailingRule) -> Self {
        self.trailing = Some(rule);
        self
    }

    pub fn with_confidence(mut self, score: u32) -> Self {
        self.confidence_score = score.min(100) as u8;
        self
    }

    /// Record a supporting value. Non-finite values are dropped so the record
    /// always serialises.
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        if value.is_finite() {
            self.supporting_metrics.insert(name.to_string(), value);
        }
        self
    }

    /// Reward over risk against the first target. `None` when there is no
    /// target or the stop sits on the wrong side of the entry.
    pub fn risk_reward(&self) -> Option<f64> {
        let target = self.take_profit.first()?.price;
        let (risk, reward) = match self.side {
            Side::Buy => (self.entry_price - self.stop_loss, target - self.entry_price),
            Side::Sell => (self.stop_loss - self.entry_price, self.entry_price - target),
        };
        (risk > 0.0).then(|| reward / risk)
    }

    /// Attach `risk_reward` to the supporting metrics when it is defined.
    pub fn with_risk_reward(self) -> Self {
        match self.risk_reward() {
            Some(rr) => self.with_metric("risk_reward", rr),
            None => self,
        }
    }
}
