//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_bars_adapter::JsonBarsAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestReport, DEFAULT_INITIAL_CAPITAL};
use crate::domain::config_validation::{
    parse_date, validate_backtest_config, validate_data_config, validate_strategy_config,
};
use crate::domain::detector::Detector;
use crate::domain::error::SigtraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::instrument::{build_unified_timeline, InstrumentData};
use crate::domain::signal::Signal;
use crate::domain::strategy::detector_from_config;
use crate::domain::universe::{load_universe, parse_codes};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Technical pattern detection and backtest simulation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and write the JSON report
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Report path; standard output when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run a single instrument instead of the configured codes
        #[arg(long)]
        code: Option<String>,
    },
    /// Print detected signals as JSON
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
        /// Signals from every bar, not only the latest
        #[arg(long)]
        all: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest { config, output, code } => run_backtest(&config, output.as_deref(), code.as_deref()),
        Command::Scan { config, code, all } => run_scan(&config, code.as_deref(), all),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SigtraderError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

fn validate_all(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    validate_backtest_config(config)?;
    validate_data_config(config)?;
    validate_strategy_config(config)?;
    Ok(())
}

fn run_backtest(config_path: &Path, output: Option<&Path>, code_override: Option<&str>) -> Result<(), SigtraderError> {
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;

    let detector = detector_from_config(&adapter)?;
    let bt_config = build_backtest_config(&adapter)?;
    let codes = resolve_codes(code_override, &adapter)?;
    let data_port = build_data_port(&adapter, config_path)?;

    let report = run_backtest_pipeline(data_port.as_ref(), detector.as_ref(), &bt_config, &codes)?;
    log_summary(&report);

    JsonReportAdapter::new().write(&report, output)?;
    if let Some(path) = output {
        info!(path = %path.display(), "report written");
    }
    Ok(())
}

/// Load bars, run the engine and assemble the report.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    detector: &dyn Detector,
    bt_config: &BacktestConfig,
    codes: &[String],
) -> Result<BacktestReport, SigtraderError> {
    let universe = load_universe(data_port, codes, Some(bt_config.end_date))?;

    let data = universe
        .instruments
        .into_iter()
        .map(|(instrument, bars)| InstrumentData::prepare(&instrument, bars, detector))
        .collect::<Result<Vec<_>, _>>()?;

    let timeline = build_unified_timeline(&data);
    let detected: usize = data.iter().map(InstrumentData::signal_count).sum();
    info!(
        instruments = data.len(),
        timestamps = timeline.len(),
        signals = detected,
        "prepared data"
    );

    let result = backtest_engine::run_backtest(&data, &timeline, detector, bt_config);
    Ok(BacktestReport::new(detector.name(), bt_config, &result))
}

fn log_summary(report: &BacktestReport) {
    let m = &report.metrics;
    info!(
        strategy = %report.strategy,
        total_trades = m.total_trades,
        win_rate = %format!("{:.1}%", m.win_rate * 100.0),
        total_return = %format!("{:.2}%", m.total_return * 100.0),
        max_drawdown = %format!("{:.2}%", m.max_drawdown * 100.0),
        profit_factor = m.profit_factor,
        sharpe = m.sharpe_ratio,
        final_equity = m.final_equity,
        "backtest summary"
    );
}

fn run_scan(config_path: &Path, code_override: Option<&str>, all: bool) -> Result<(), SigtraderError> {
    let adapter = load_config(config_path)?;
    validate_data_config(&adapter)?;
    validate_strategy_config(&adapter)?;

    let detector = detector_from_config(&adapter)?;
    let data_port = build_data_port(&adapter, config_path)?;
    let codes = match code_override {
        Some(code) => vec![code.trim().to_string()],
        None if adapter.has_key("backtest", "codes") => resolve_codes(None, &adapter)?,
        None => data_port.list_instruments()?,
    };

    let signals = scan_signals(data_port.as_ref(), detector.as_ref(), &codes, all)?;
    info!(strategy = detector.name(), signals = signals.len(), "scan complete");
    println!("{}", serde_json::to_string_pretty(&signals)?);
    Ok(())
}

/// Run `detector` over each instrument's full history. Without `all`, only
/// signals on an instrument's last bar are kept. Sorted by timestamp, then
/// instrument.
pub fn scan_signals(
    data_port: &dyn DataPort,
    detector: &dyn Detector,
    codes: &[String],
    all: bool,
) -> Result<Vec<Signal>, SigtraderError> {
    let universe = load_universe(data_port, codes, None)?;
    let mut signals = Vec::new();

    for (instrument, bars) in universe.instruments {
        let data = InstrumentData::prepare(&instrument, bars, detector)?;
        let last = data.bar_count().saturating_sub(1);
        signals.extend(
            data.signals
                .into_iter()
                .filter(|(i, _)| all || *i == last)
                .flat_map(|(_, found)| found),
        );
    }

    signals.sort_by(|a, b| (a.timestamp, &a.instrument).cmp(&(b.timestamp, &b.instrument)));
    Ok(signals)
}

fn run_validate(config_path: &Path) -> Result<(), SigtraderError> {
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;
    let detector = detector_from_config(&adapter)?;
    let codes = resolve_codes(None, &adapter)?;
    info!(strategy = detector.name(), codes = codes.len(), "configuration is valid");
    Ok(())
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, SigtraderError> {
    let start_date = parse_date(adapter.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(adapter.get_string("backtest", "end_date").as_deref(), "end_date")?;

    let defaults = ExecutionConfig::default();
    let execution = ExecutionConfig {
        position_fraction: adapter.get_double("backtest", "position_fraction", defaults.position_fraction),
        commission_rate: adapter.get_double("backtest", "commission_rate", defaults.commission_rate),
        commission_per_trade: adapter.get_double("backtest", "commission_per_trade", defaults.commission_per_trade),
        slippage_rate: adapter.get_double("backtest", "slippage_rate", defaults.slippage_rate),
        allow_shorting: adapter.get_bool("backtest", "allow_shorting", defaults.allow_shorting),
        min_future_bars: adapter.get_usize("backtest", "min_future_bars", defaults.min_future_bars),
    };

    let max_positions = match adapter.get_int("backtest", "max_positions", 0) {
        n if n > 0 => usize::try_from(n).ok(),
        _ => None,
    };

    Ok(BacktestConfig {
        start_date,
        end_date,
        initial_capital: adapter.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        execution,
        max_positions,
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", 0.0),
    })
}

pub fn resolve_codes(code_override: Option<&str>, config: &dyn ConfigPort) -> Result<Vec<String>, SigtraderError> {
    if let Some(c) = code_override {
        return Ok(vec![c.trim().to_string()]);
    }

    match config.get_string("backtest", "codes") {
        Some(codes) => Ok(parse_codes(&codes)?),
        None => Err(SigtraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "codes".to_string(),
        }),
    }
}

/// Data adapter for `[data] format`. A relative `[data] path` is resolved
/// against the config file's directory.
pub fn build_data_port(config: &dyn ConfigPort, config_path: &Path) -> Result<Box<dyn DataPort>, SigtraderError> {
    let raw_path = config
        .get_string("data", "path")
        .ok_or_else(|| SigtraderError::ConfigMissing {
            section: "data".to_string(),
            key: "path".to_string(),
        })?;
    let path = PathBuf::from(raw_path.trim());
    let base = if path.is_relative() {
        config_path.parent().map(|dir| dir.join(&path)).unwrap_or(path)
    } else {
        path
    };

    let format = config
        .get_string("data", "format")
        .map(|f| f.trim().to_lowercase())
        .unwrap_or_else(|| "csv".to_string());

    match format.as_str() {
        "csv" => Ok(Box::new(CsvAdapter::new(base))),
        "json" => Ok(Box::new(JsonBarsAdapter::new(base))),
        other => Err(SigtraderError::ConfigInvalid {
            section: "data".to_string(),
            key: "format".to_string(),
            reason: format!("unsupported format {other:?}"),
        }),
    }
}
