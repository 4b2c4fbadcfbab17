//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: the line is undefined for the first (slow-1) bars, the signal line
//! and histogram for the first (slow-1 + signal-1) bars.

use crate::domain::indicator::ema::ema_raw;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdSeries {
    let n = closes.len();
    if n == 0 || fast == 0 || slow == 0 || signal_period == 0 {
        return MacdSeries {
            line: vec![None; n],
            signal: vec![None; n],
            histogram: vec![None; n],
        };
    }

    let ema_fast = ema_raw(closes, fast);
    let ema_slow = ema_raw(closes, slow);
    let raw_line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let raw_signal = ema_raw(&raw_line, signal_period);

    let line_warmup = fast.max(slow) - 1;
    let signal_warmup = line_warmup + signal_period - 1;

    let mut line = Vec::with_capacity(n);
    let mut signal = Vec::with_capacity(n);
    let mut histogram = Vec::with_capacity(n);
    for i in 0..n {
        line.push((i >= line_warmup).then_some(raw_line[i]));
        if i >= signal_warmup {
            signal.push(Some(raw_signal[i]));
            histogram.push(Some(raw_line[i] - raw_signal[i]));
        } else {
            signal.push(None);
            histogram.push(None);
        }
    }

    MacdSeries {
        line,
        signal,
        histogram,
    }
}
