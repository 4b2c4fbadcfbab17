//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod detector;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod simulator;
pub mod backtest;
pub mod metrics;
pub mod serde_helpers;
pub mod strategy;
pub mod instrument;
pub mod universe;
pub mod config_validation;
pub mod error;
