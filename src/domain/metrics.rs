//! Performance metrics over closed trades and the equity curve.
//!
//! Trade statistics are computed per position: the legs of a multi-tier
//! exit are grouped by position id, their P&L summed and their returns
//! blended by fraction. Exit-reason counts are per leg.

use serde::Serialize;
use std::collections::BTreeMap;

use super::execution::RejectReason;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ExitReason, Trade};
use super::serde_helpers::serialize_f64_or_inf;
use super::simulator::blended_return_pct;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// One position reassembled from its exit legs.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionOutcome {
    pub position_id: u64,
    pub instrument: String,
    pub pnl: f64,
    pub return_pct: f64,
    pub hold_days: f64,
    pub hold_bars: usize,
}

/// Group legs by position id, in id order.
pub fn position_outcomes(trades: &[Trade]) -> Vec<PositionOutcome> {
    let mut grouped: BTreeMap<u64, Vec<Trade>> = BTreeMap::new();
    for trade in trades {
        grouped.entry(trade.position_id).or_default().push(trade.clone());
    }
    grouped
        .into_iter()
        .map(|(position_id, legs)| PositionOutcome {
            position_id,
            instrument: legs[0].instrument.clone(),
            pnl: legs.iter().map(|t| t.pnl).sum(),
            return_pct: blended_return_pct(&legs),
            hold_days: legs.iter().map(Trade::hold_days).fold(0.0, f64::max),
            hold_bars: legs.iter().map(|t| t.hold_bars).max().unwrap_or(0),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MetricsReport {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_return: f64,
    pub final_equity: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    pub largest_win_pct: f64,
    pub largest_loss_pct: f64,
    pub expectancy_pct: f64,
    #[serde(serialize_with = "serialize_f64_or_inf")]
    pub profit_factor: f64,
    pub avg_hold_days: f64,
    pub avg_hold_bars: f64,
    /// Deepest peak-to-trough decline as a fraction of the peak, `<= 0`.
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub exit_reasons: BTreeMap<ExitReason, usize>,
    pub rejected_signals: BTreeMap<RejectReason, usize>,
}

impl MetricsReport {
    pub fn compute(portfolio: &Portfolio, risk_free_rate: f64) -> Self {
        let mut report = Self::from_trades(&portfolio.trades);

        let initial = portfolio.initial_capital;
        report.final_equity = portfolio
            .equity_curve
            .last()
            .map(|p| p.total_equity)
            .unwrap_or(initial);
        report.total_return = if initial > 0.0 && !portfolio.trades.is_empty() {
            (report.final_equity - initial) / initial
        } else {
            0.0
        };

        if !portfolio.trades.is_empty() {
            let (max_drawdown, duration) = compute_drawdown(&portfolio.equity_curve);
            report.max_drawdown = max_drawdown;
            report.max_drawdown_duration = duration;
            let per_bar_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
            let (sharpe, sortino) = compute_risk_adjusted(&portfolio.equity_curve, per_bar_rf);
            report.sharpe_ratio = sharpe;
            report.sortino_ratio = sortino;
        }

        for rejection in &portfolio.rejected {
            *report.rejected_signals.entry(rejection.reason).or_default() += 1;
        }

        report
    }

    /// Trade statistics only; equity-based fields stay zero.
    pub fn from_trades(trades: &[Trade]) -> Self {
        let outcomes = position_outcomes(trades);
        if outcomes.is_empty() {
            return MetricsReport::default();
        }

        let wins: Vec<&PositionOutcome> = outcomes.iter().filter(|o| o.pnl > 0.0).collect();
        let losses: Vec<&PositionOutcome> = outcomes.iter().filter(|o| o.pnl < 0.0).collect();
        let total = outcomes.len();

        let gross_profit: f64 = wins.iter().map(|o| o.pnl).sum();
        let gross_loss: f64 = losses.iter().map(|o| o.pnl).sum::<f64>().abs();
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let win_rate = wins.len() as f64 / total as f64;
        let avg_win_pct = mean(wins.iter().map(|o| o.return_pct));
        let avg_loss_pct = mean(losses.iter().map(|o| o.return_pct));

        let mut exit_reasons = BTreeMap::new();
        for trade in trades {
            *exit_reasons.entry(trade.exit_reason).or_default() += 1;
        }

        MetricsReport {
            total_trades: total,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate,
            total_pnl: outcomes.iter().map(|o| o.pnl).sum(),
            avg_win_pct,
            avg_loss_pct,
            largest_win_pct: wins.iter().map(|o| o.return_pct).fold(0.0, f64::max),
            largest_loss_pct: losses.iter().map(|o| o.return_pct).fold(0.0, f64::min),
            expectancy_pct: win_rate * avg_win_pct + (1.0 - win_rate) * avg_loss_pct,
            profit_factor,
            avg_hold_days: mean(outcomes.iter().map(|o| o.hold_days)),
            avg_hold_bars: mean(outcomes.iter().map(|o| o.hold_bars as f64)),
            exit_reasons,
            ..MetricsReport::default()
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Returns `(min((equity - running_max) / running_max), longest underwater run)`.
pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.total_equity;
    let mut max_dd = 0.0_f64;
    let mut current_duration = 0usize;
    let mut max_duration = 0usize;

    for point in equity_curve {
        if point.total_equity >= peak {
            peak = point.total_equity;
            current_duration = 0;
            continue;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((point.total_equity - peak) / peak);
        }
        current_duration += 1;
        max_duration = max_duration.max(current_duration);
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], per_bar_rf: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].total_equity;
            if prev > 0.0 {
                (w[1].total_equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let avg = returns.iter().sum::<f64>() / n;
    let stddev = (returns.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / n).sqrt();
    let excess = avg - per_bar_rf;

    let sharpe = if stddev > 0.0 {
        excess / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < per_bar_rf)
        .map(|&r| (r - per_bar_rf).powi(2))
        .sum();
    let downside_dev = (downside / n).sqrt();
    let sortino = if downside_dev > 0.0 {
        excess / downside_dev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
