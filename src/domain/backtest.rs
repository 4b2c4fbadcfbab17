//! Backtest engine and report.
//!
//! Bars are replayed in timestamp order over the unified timeline; at each
//! timestamp instruments are visited in name order. Per instrument bar the
//! engine settles exits for the open position, then tries to enter the
//! signals detected on that bar. One equity point is recorded per timestamp.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::detector::Detector;
use super::error::SigtraderError;
use super::execution::{enter_position, process_position_bar, EntryResult, ExecutionConfig, RejectReason};
use super::indicator::value_at;
use super::instrument::InstrumentData;
use super::metrics::MetricsReport;
use super::portfolio::{EquityPoint, Portfolio, RejectedSignal};
use super::position::{BarContext, ExitRules, PositionSide, Trade};
use super::signal::Signal;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    /// Cap on simultaneously open positions; `None` for no cap.
    pub max_positions: Option<usize>,
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        BacktestConfig {
            start_date,
            end_date,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            execution: ExecutionConfig::default(),
            max_positions: None,
            risk_free_rate: 0.0,
        }
    }

    fn in_window(&self, timestamp: NaiveDateTime) -> bool {
        let date = timestamp.date();
        date >= self.start_date && date <= self.end_date
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    /// Signals seen inside the window, entered or not.
    pub signal_count: usize,
}

pub fn run_backtest(
    data: &[InstrumentData],
    timeline: &[NaiveDateTime],
    detector: &dyn Detector,
    config: &BacktestConfig,
) -> BacktestResult {
    let rules = detector.exit_rules();
    let mut instruments: Vec<&InstrumentData> = data.iter().collect();
    instruments.sort_by(|a, b| a.instrument.cmp(&b.instrument));

    let last_index: BTreeMap<&str, usize> = instruments
        .iter()
        .filter_map(|d| Some((d.instrument.as_str(), d.last_index_until(config.end_date)?)))
        .collect();

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut last_close: BTreeMap<String, f64> = BTreeMap::new();
    let mut signal_count = 0usize;

    info!(
        strategy = detector.name(),
        instruments = instruments.len(),
        start = %config.start_date,
        end = %config.end_date,
        "running backtest"
    );

    for &timestamp in timeline {
        if !config.in_window(timestamp) {
            continue;
        }

        for inst in &instruments {
            let Some(i) = inst.get_bar_index(timestamp) else {
                continue;
            };
            let Some(&last) = last_index.get(inst.instrument.as_str()) else {
                continue;
            };
            let bar = &inst.bars[i];
            let signals = inst.signals_at(i);

            if let Some(position) = portfolio.get_position(&inst.instrument) {
                let ctx = BarContext {
                    fast_ema: value_at(&inst.indicators.ema_fast, i),
                    opposing_signal: signals.iter().any(|s| PositionSide::from(s.side) != position.side),
                    last_bar: i == last,
                };
                process_position_bar(&mut portfolio, &inst.instrument, bar, i, &ctx, &config.execution);
            }

            for signal in signals {
                signal_count += 1;
                try_enter(&mut portfolio, signal, last - i, &rules, config);
            }

            last_close.insert(inst.instrument.clone(), bar.close);
        }

        portfolio.record_equity(timestamp, &last_close);
    }

    info!(
        signals = signal_count,
        trades = portfolio.trades.len(),
        rejected = portfolio.rejected.len(),
        cash = portfolio.cash,
        "backtest complete"
    );

    BacktestResult {
        portfolio,
        signal_count,
    }
}

fn try_enter(
    portfolio: &mut Portfolio,
    signal: &Signal,
    future_bars: usize,
    rules: &ExitRules,
    config: &BacktestConfig,
) {
    let rejection = if portfolio.has_position(&signal.instrument) {
        Some(RejectReason::PositionOpen)
    } else if config.max_positions.is_some_and(|max| portfolio.position_count() >= max) {
        Some(RejectReason::MaxPositions)
    } else if future_bars < config.execution.min_future_bars.max(1) {
        Some(RejectReason::InsufficientFutureBars)
    } else {
        match enter_position(portfolio, signal, rules, &config.execution) {
            EntryResult::Entered { .. } => None,
            EntryResult::Rejected(reason) => Some(reason),
        }
    };

    if let Some(reason) = rejection {
        debug!(
            instrument = %signal.instrument,
            timestamp = %signal.timestamp,
            ?reason,
            "signal rejected"
        );
        portfolio.record_rejection(RejectedSignal {
            instrument: signal.instrument.clone(),
            timestamp: signal.timestamp,
            strategy: signal.strategy_tag.clone(),
            reason,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Serialized outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub strategy: String,
    pub period: ReportPeriod,
    pub metrics: MetricsReport,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestReport {
    pub fn new(strategy: &str, config: &BacktestConfig, result: &BacktestResult) -> Self {
        BacktestReport {
            strategy: strategy.to_string(),
            period: ReportPeriod {
                start: config.start_date,
                end: config.end_date,
            },
            metrics: MetricsReport::compute(&result.portfolio, config.risk_free_rate),
            trades: result.portfolio.trades.clone(),
            equity_curve: result.portfolio.equity_curve.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, SigtraderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
