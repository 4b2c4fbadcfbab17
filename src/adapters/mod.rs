//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_bars_adapter;
pub mod json_report_adapter;
pub mod raw_bar;
