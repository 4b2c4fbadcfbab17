//! RSI (Relative Strength Index) indicator.
//!
//! A window of n closes (n-1 changes) seeds the average gain/loss with their
//! simple mean. Subsequent bars use Wilder's smoothing:
//! avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100, or 50 when there was no movement at all.
//!
//! Warmup: first (n-1) bars are undefined.

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = vec![None; closes.len()];
    if period < 2 || closes.len() < period {
        return values;
    }

    let change = |i: usize| closes[i] - closes[i - 1];
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let seed_len = (period - 1) as f64;
    let mut avg_gain = (1..period).map(|i| gain(change(i))).sum::<f64>() / seed_len;
    let mut avg_loss = (1..period).map(|i| loss(change(i))).sum::<f64>() / seed_len;
    values[period - 1] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in period..closes.len() {
        let c = change(i);
        avg_gain = (avg_gain * (period - 1) as f64 + gain(c)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(c)) / period as f64;
        values[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    values
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty_and_short() {
        assert!(calculate_rsi(&[], 14).is_empty());
        let series = calculate_rsi(&[100.0; 5], 14);
        assert!(series.iter().all(Option::is_none));
    }

    #[test]
    fn rsi_warmup_period() {
        let closes: Vec<f64> = (1..=20).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let series = calculate_rsi(&closes, 14);
        for (i, v) in series.iter().enumerate().take(13) {
            assert!(v.is_none(), "bar {} should be undefined", i);
        }
        assert!(series[13].is_some());
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&closes, 14);
        assert!((series[14].unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&closes, 14);
        assert!(series[14].unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_flat_is_neutral() {
        let series = calculate_rsi(&[50.0; 16], 14);
        assert!((series[15].unwrap() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_in_range() {
        let closes: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        for v in calculate_rsi(&closes, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "RSI {} out of range", v);
        }
    }

    #[test]
    fn rsi_wilder_step() {
        // period 3: seed from changes +2, -1 → gain 1.0, loss 0.5
        let closes = [10.0, 12.0, 11.0, 14.0];
        let series = calculate_rsi(&closes, 3);
        let seed = 100.0 - 100.0 / (1.0 + 1.0 / 0.5);
        assert!((series[2].unwrap() - seed).abs() < 1e-12);
        let g = (1.0 * 2.0 + 3.0) / 3.0;
        let l = (0.5 * 2.0) / 3.0;
        let next = 100.0 - 100.0 / (1.0 + g / l);
        assert!((series[3].unwrap() - next).abs() < 1e-12);
    }
}
