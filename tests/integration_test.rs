//! End-to-end tests over the domain pipeline with an in-memory data port.
//!
//! Tests cover:
//! - Breakout detection on the synthetic uptrend and flat series
//! - Full backtest pipeline from data port to JSON report
//! - Partial universe loading (missing and failing instruments)
//! - Deterministic, repeatable output across runs and instrument order

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use sigtrader::cli::{run_backtest_pipeline, scan_signals};
use sigtrader::domain::backtest::BacktestReport;
use sigtrader::domain::detector::{
    BreakoutConfig, BreakoutConfirmationDetector, BreakoutDetector, Detector, DivergenceDetector,
    EmaCrossoverDetector, TrendPullbackDetector,
};
use sigtrader::domain::error::SigtraderError;
use sigtrader::domain::position::ExitReason;
use sigtrader::domain::universe::{load_universe, SkipReason};

fn breakout_detector() -> BreakoutDetector {
    BreakoutDetector::new(BreakoutConfig {
        rsi_max: 100.0,
        ..BreakoutConfig::default()
    })
}

mod breakout_scenarios {
    use super::*;

    #[test]
    fn uptrend_spike_yields_single_signal_at_spike() {
        let bars = uptrend_with_spike(60, 31);
        let signals = breakout_detector().detect("UP", &bars);

        assert_eq!(signals.len(), 1);
        let s = &signals[0];
        assert_eq!(s.bar_index, 31);
        assert_eq!(s.timestamp, bars[31].timestamp);
        assert_eq!(s.entry_price, bars[31].close);
        assert_abs_diff_eq!(s.stop_loss, s.entry_price * 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(s.take_profit[0].price, s.entry_price * 1.10, epsilon = 1e-9);
        assert!(s.supporting_metrics["rsi"] >= 70.0);
        assert!(s.supporting_metrics["volume_ratio"] >= 3.0);
    }

    #[test]
    fn flat_series_yields_no_breakouts() {
        let bars = flat_series(50);
        assert!(BreakoutDetector::default().detect("FLAT", &bars).is_empty());
        assert!(breakout_detector().detect("FLAT", &bars).is_empty());
    }

    #[test]
    fn no_detector_signals_on_flat_series() {
        let bars = flat_series(80);
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(BreakoutDetector::default()),
            Box::new(BreakoutConfirmationDetector::default()),
            Box::new(DivergenceDetector::default()),
            Box::new(TrendPullbackDetector::default()),
        ];
        for detector in detectors {
            assert!(
                detector.detect("FLAT", &bars).is_empty(),
                "{} fired on a flat series",
                detector.name()
            );
        }
    }
}

mod full_backtest_pipeline {
    use super::*;

    #[test]
    fn spike_trade_hits_target() {
        let bars = uptrend_with_spike(60, 31);
        let port = MockDataPort::new().with_bars("UP", bars.clone());
        let config = zero_cost_config(&bars);

        let report =
            run_backtest_pipeline(&port, &breakout_detector(), &config, &["UP".to_string()]).unwrap();

        assert_eq!(report.strategy, "breakout");
        assert_eq!(report.trades.len(), 1);
        let trade = &report.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert_abs_diff_eq!(trade.return_pct, 10.0, epsilon = 1e-9);
        assert_eq!(trade.entry_timestamp, bars[31].timestamp);
        assert_eq!(trade.hold_bars, 19);

        let m = &report.metrics;
        assert_eq!(m.total_trades, 1);
        assert_eq!(m.winning_trades, 1);
        assert!(m.profit_factor.is_infinite());
        assert!(m.max_drawdown <= 0.0);
        assert_abs_diff_eq!(m.final_equity, config.initial_capital + m.total_pnl, epsilon = 1e-6);
        assert_eq!(report.equity_curve.len(), bars.len());
    }

    #[test]
    fn flat_series_gives_zero_report() {
        let bars = flat_series(50);
        let port = MockDataPort::new().with_bars("FLAT", bars.clone());
        let config = zero_cost_config(&bars);

        let report =
            run_backtest_pipeline(&port, &BreakoutDetector::default(), &config, &["FLAT".to_string()]).unwrap();

        assert!(report.trades.is_empty());
        let m = &report.metrics;
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.final_equity, config.initial_capital);
    }

    #[test]
    fn window_excludes_signals_before_start() {
        let bars = uptrend_with_spike(60, 31);
        let port = MockDataPort::new().with_bars("UP", bars.clone());
        let mut config = zero_cost_config(&bars);
        config.start_date = bars[40].date();

        let report =
            run_backtest_pipeline(&port, &breakout_detector(), &config, &["UP".to_string()]).unwrap();
        assert!(report.trades.is_empty());
        assert_eq!(report.period.start, bars[40].date());
        assert_eq!(report.equity_curve.len(), 20);
    }

    #[test]
    fn malformed_bar_fails_the_run() {
        let mut bars = uptrend_with_spike(40, 31);
        bars[5].low = bars[5].high + 1.0;
        let port = MockDataPort::new().with_bars("BAD", bars.clone());

        let err = run_backtest_pipeline(&port, &breakout_detector(), &zero_cost_config(&bars), &["BAD".to_string()])
            .unwrap_err();
        assert!(matches!(err, SigtraderError::MalformedBar { index: 5, .. }));
    }

    #[test]
    fn ema_crossover_runs_over_wavy_series() {
        let bars = wavy_series(200, 3);
        let port = MockDataPort::new().with_bars("WAVE", bars.clone());
        let report = run_backtest_pipeline(
            &port,
            &EmaCrossoverDetector::default(),
            &zero_cost_config(&bars),
            &["WAVE".to_string()],
        )
        .unwrap();

        for trade in &report.trades {
            assert!(trade.exit_timestamp >= trade.entry_timestamp);
            assert!(trade.fraction > 0.0 && trade.fraction <= 1.0);
        }
        let closed: f64 = report.trades.iter().map(|t| t.fraction).sum();
        let positions = report
            .trades
            .iter()
            .map(|t| t.position_id)
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        assert_abs_diff_eq!(closed, positions as f64, epsilon = 1e-9);
    }
}

mod partial_universe {
    use super::*;

    #[test]
    fn missing_and_failing_instruments_are_skipped() {
        let port = MockDataPort::new()
            .with_bars("GOOD", flat_series(30))
            .with_error("FAIL", "connection reset");
        let codes = vec!["GOOD".to_string(), "MISSING".to_string(), "FAIL".to_string()];

        let loaded = load_universe(&port, &codes, None).unwrap();
        assert_eq!(loaded.count(), 1);
        assert_eq!(loaded.skipped.len(), 2);
        assert_eq!(loaded.skipped[0].reason, SkipReason::NoData);
        assert!(matches!(&loaded.skipped[1].reason, SkipReason::Unreadable(r) if r.contains("connection reset")));
    }

    #[test]
    fn all_missing_is_an_error() {
        let port = MockDataPort::new();
        let err = load_universe(&port, &["NONE".to_string()], None).unwrap_err();
        assert!(matches!(err, SigtraderError::InsufficientData { .. }));
    }
}

mod determinism {
    use super::*;

    fn report_for(codes: &[&str]) -> BacktestReport {
        let port = MockDataPort::new()
            .with_bars("AAA", uptrend_with_spike(60, 31))
            .with_bars("BBB", uptrend_with_spike(60, 25))
            .with_bars("CCC", wavy_series(60, 9));
        let config = zero_cost_config(&uptrend_with_spike(60, 31));
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        run_backtest_pipeline(&port, &breakout_detector(), &config, &codes).unwrap()
    }

    #[test]
    fn rerun_is_byte_identical() {
        let first = report_for(&["AAA", "BBB", "CCC"]).to_json().unwrap();
        let second = report_for(&["AAA", "BBB", "CCC"]).to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn instrument_order_does_not_matter() {
        let forward = report_for(&["AAA", "BBB", "CCC"]).to_json().unwrap();
        let reversed = report_for(&["CCC", "BBB", "AAA"]).to_json().unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn report_has_expected_top_level_keys() {
        let json: serde_json::Value = serde_json::from_str(&report_for(&["AAA"]).to_json().unwrap()).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["equity_curve", "metrics", "period", "strategy", "trades"]);
    }
}

mod scan {
    use super::*;

    #[test]
    fn all_bars_scan_finds_spike() {
        let port = MockDataPort::new().with_bars("UP", uptrend_with_spike(60, 31));
        let signals = scan_signals(&port, &breakout_detector(), &["UP".to_string()], true).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].bar_index, 31);
    }

    #[test]
    fn latest_bar_scan_ignores_older_signals() {
        let port = MockDataPort::new().with_bars("UP", uptrend_with_spike(60, 31));
        let signals = scan_signals(&port, &breakout_detector(), &["UP".to_string()], false).unwrap();
        assert!(signals.is_empty());

        let port = MockDataPort::new().with_bars("UP", uptrend_with_spike(32, 31));
        let signals = scan_signals(&port, &breakout_detector(), &["UP".to_string()], false).unwrap();
        assert_eq!(signals.len(), 1);
    }
}
