//! Configuration validation.
//!
//! Checks every section a run reads before any data is loaded. Missing
//! optional keys are fine; present keys must be in range.

use crate::domain::error::SigtraderError;
use crate::domain::strategy::{
    breakout_config, breakout_confirmation_config, divergence_config, ema_crossover_config, strategy_kind,
    trend_pullback_config, StrategyKind,
};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    validate_initial_capital(config)?;
    validate_position_fraction(config)?;
    validate_costs(config)?;
    validate_risk_free_rate(config)?;
    validate_max_positions(config)?;
    validate_dates(config)?;
    validate_codes(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => {}
        _ => return Err(missing("data", "path")),
    }
    if let Some(format) = config.get_string("data", "format") {
        let format = format.trim().to_lowercase();
        if format != "csv" && format != "json" {
            return Err(invalid("data", "format", "format must be csv or json"));
        }
    }
    Ok(())
}

/// Strategy name plus the parameter bands of the selected detector.
pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    let kind = strategy_kind(config)?;
    let section = kind.as_str();
    match kind {
        StrategyKind::Breakout => {
            let c = breakout_config(config);
            require_period(section, "lookback", c.lookback)?;
            require_period(section, "volume_avg_period", c.volume_avg_period)?;
            require_period(section, "rsi_period", c.rsi_period)?;
            require_rsi_band(section, c.rsi_min, c.rsi_max)?;
            require_positive(section, "volume_multiplier", c.volume_multiplier)?;
            require_fraction(section, "stop_loss_pct", c.stop_loss_pct)?;
            require_positive(section, "take_profit_pct", c.take_profit_pct)?;
        }
        StrategyKind::BreakoutConfirmation => {
            let c = breakout_confirmation_config(config);
            require_period(section, "consolidation_bars", c.consolidation_bars)?;
            require_period(section, "atr_period", c.atr_period)?;
            require_period(section, "atr_average_period", c.atr_average_period)?;
            require_period(section, "breakout_lookback", c.breakout_lookback)?;
            require_period(section, "confirmation_window", c.confirmation_window)?;
            if c.consolidation_lookback < c.consolidation_bars {
                return Err(invalid(
                    section,
                    "consolidation_lookback",
                    "consolidation_lookback must be at least consolidation_bars",
                ));
            }
            require_positive(section, "volume_multiplier", c.volume_multiplier)?;
            require_positive(section, "trailing_atr_multiple", c.trailing_atr_multiple)?;
            require_fraction(section, "close_position_min", c.close_position_min)?;
            require_fraction(section, "stop_loss_buffer", c.stop_loss_buffer)?;
        }
        StrategyKind::BearishDivergence => {
            let c = divergence_config(config);
            require_period(section, "peak_order", c.peak_order)?;
            require_period(section, "rsi_period", c.rsi_period)?;
            if c.lookback <= c.peak_order {
                return Err(invalid(section, "lookback", "lookback must exceed peak_order"));
            }
            if !(0.0..=100.0).contains(&c.rsi_threshold) {
                return Err(invalid(section, "rsi_threshold", "rsi_threshold must be within [0, 100]"));
            }
            require_positive(section, "take_profit_pct", c.take_profit_pct)?;
            require_positive(section, "stop_loss_pct", c.stop_loss_pct)?;
            require_fraction(section, "take_profit_pct", c.take_profit_pct)?;
        }
        StrategyKind::EmaCrossover => {
            let c = ema_crossover_config(config);
            require_ema_pair(section, c.fast_period, c.slow_period)?;
            require_period(section, "volume_avg_period", c.volume_avg_period)?;
            require_fraction(section, "stop_loss_pct", c.stop_loss_pct)?;
        }
        StrategyKind::TrendPullback => {
            let c = trend_pullback_config(config);
            require_ema_pair(section, c.fast_period, c.slow_period)?;
            require_period(section, "rsi_period", c.rsi_period)?;
            require_period(section, "slope_lookback", c.slope_lookback)?;
            require_period(section, "high_lookback", c.high_lookback)?;
            require_rsi_band(section, c.rsi_min, c.rsi_max)?;
            if c.pullback_min < 0.0 || c.pullback_min >= c.pullback_max {
                return Err(invalid(
                    section,
                    "pullback_min",
                    "pullback_min must be non-negative and below pullback_max",
                ));
            }
            if c.first_target_pct <= 0.0 || c.first_target_pct >= c.second_target_pct {
                return Err(invalid(
                    section,
                    "first_target_pct",
                    "first_target_pct must be positive and below second_target_pct",
                ));
            }
            if c.tier_fraction <= 0.0 || c.tier_fraction > 0.5 {
                return Err(invalid(section, "tier_fraction", "tier_fraction must be in (0, 0.5]"));
            }
            require_fraction(section, "stop_buffer", c.stop_buffer)?;
        }
    }
    Ok(())
}

fn missing(section: &str, key: &str) -> SigtraderError {
    SigtraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SigtraderError {
    SigtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn require_period(section: &str, key: &str, value: usize) -> Result<(), SigtraderError> {
    if value == 0 {
        return Err(invalid(section, key, &format!("{key} must be at least 1")));
    }
    Ok(())
}

fn require_positive(section: &str, key: &str, value: f64) -> Result<(), SigtraderError> {
    if value.is_nan() || value <= 0.0 {
        return Err(invalid(section, key, &format!("{key} must be positive")));
    }
    Ok(())
}

/// Value in [0, 1).
fn require_fraction(section: &str, key: &str, value: f64) -> Result<(), SigtraderError> {
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(section, key, &format!("{key} must be in [0, 1)")));
    }
    Ok(())
}

fn require_rsi_band(section: &str, min: f64, max: f64) -> Result<(), SigtraderError> {
    if min < 0.0 || max > 100.0 || min >= max {
        return Err(invalid(section, "rsi_min", "rsi_min must be below rsi_max within [0, 100]"));
    }
    Ok(())
}

fn require_ema_pair(section: &str, fast: usize, slow: usize) -> Result<(), SigtraderError> {
    require_period(section, "fast_period", fast)?;
    if fast >= slow {
        return Err(invalid(section, "fast_period", "fast_period must be below slow_period"));
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    if !config.has_key("backtest", "initial_capital") {
        return Ok(());
    }
    let value = config.get_double("backtest", "initial_capital", 0.0);
    if value <= 0.0 {
        return Err(invalid("backtest", "initial_capital", "initial_capital must be positive"));
    }
    Ok(())
}

fn validate_position_fraction(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    if !config.has_key("backtest", "position_fraction") {
        return Ok(());
    }
    let value = config.get_double("backtest", "position_fraction", 0.0);
    if value <= 0.0 || value > 1.0 {
        return Err(invalid(
            "backtest",
            "position_fraction",
            "position_fraction must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_costs(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    for key in ["commission_rate", "commission_per_trade", "slippage_rate"] {
        let value = config.get_double("backtest", key, 0.0);
        if value < 0.0 {
            return Err(invalid("backtest", key, &format!("{key} must be non-negative")));
        }
    }
    for key in ["commission_rate", "slippage_rate"] {
        if config.get_double("backtest", key, 0.0) >= 1.0 {
            return Err(invalid("backtest", key, &format!("{key} must be below 1")));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid("backtest", "risk_free_rate", "risk_free_rate must be between 0 and 1"));
    }
    Ok(())
}

fn validate_max_positions(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    if !config.has_key("backtest", "max_positions") {
        return Ok(());
    }
    if config.get_int("backtest", "max_positions", 0) < 1 {
        return Err(invalid("backtest", "max_positions", "max_positions must be at least 1"));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date > end_date {
        return Err(invalid("backtest", "start_date", "start_date must not be after end_date"));
    }
    Ok(())
}

/// Parse a required `YYYY-MM-DD` key of `[backtest]`.
pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, SigtraderError> {
    match value {
        None => Err(missing("backtest", field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                field,
                &format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    match config.get_string("backtest", "codes") {
        Some(c) if !c.trim().is_empty() => Ok(()),
        _ => Err(missing("backtest", "codes")),
    }
}
