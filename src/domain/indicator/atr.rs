//! Average True Range: simple rolling mean of true range.
//!
//! The first bar has no previous close, so its true range is high - low.

use crate::domain::indicator::rolling::rolling_mean;
use crate::domain::ohlcv::Bar;

pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    rolling_mean(&true_ranges(bars), period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::parse_timestamp;

    fn bar(day: u32, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: parse_timestamp(&format!("2024-01-{:02}", day)).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn atr_first_bar_uses_high_low() {
        let bars = vec![bar(1, 12.0, 8.0, 10.0)];
        assert!((true_ranges(&bars)[0] - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn atr_rolling_mean_of_true_range() {
        let bars = vec![
            bar(1, 12.0, 8.0, 10.0),  // 4
            bar(2, 11.0, 10.0, 10.5), // max(1, 1, 0) = 1
            bar(3, 15.0, 14.0, 14.5), // gap up: |15-10.5| = 4.5
        ];
        let atr = calculate_atr(&bars, 2);
        assert!(atr[0].is_none());
        assert!((atr[1].unwrap() - 2.5).abs() < f64::EPSILON);
        assert!((atr[2].unwrap() - 2.75).abs() < f64::EPSILON);
    }

    #[test]
    fn atr_warmup() {
        let bars: Vec<Bar> = (1..=20).map(|d| bar(d, 11.0, 9.0, 10.0)).collect();
        let atr = calculate_atr(&bars, 14);
        assert!(atr[..13].iter().all(Option::is_none));
        assert!(atr[13..].iter().all(Option::is_some));
    }
}
