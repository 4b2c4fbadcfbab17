//! Rolling-window helpers shared by indicators and detectors.

/// Mean over the trailing `window` values, current value included.
///
/// Each window is summed on its own, so a value depends only on the bars in
/// its window and not on how long the series is.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    for (start, slice) in values.windows(window).enumerate() {
        out[start + window - 1] = Some(slice.iter().sum::<f64>() / window as f64);
    }
    out
}

/// Mean of `values[from..to]`, or `None` for an empty or out-of-bounds range.
pub fn mean(values: &[f64], from: usize, to: usize) -> Option<f64> {
    if from >= to || to > values.len() {
        return None;
    }
    Some(values[from..to].iter().sum::<f64>() / (to - from) as f64)
}

/// Maximum of `values[from..to]`.
pub fn highest(values: &[f64], from: usize, to: usize) -> Option<f64> {
    if from >= to || to > values.len() {
        return None;
    }
    values[from..to].iter().copied().reduce(f64::max)
}

/// Minimum of `values[from..to]`.
pub fn lowest(values: &[f64], from: usize, to: usize) -> Option<f64> {
    if from >= to || to > values.len() {
        return None;
    }
    values[from..to].iter().copied().reduce(f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_includes_current() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn rolling_mean_ignores_bars_outside_window() {
        let tail = [1_000.0, 1_200.0, 900.0, 1_100.0, 1_000.0];
        let mut long: Vec<f64> = (0..5_000).map(|i| if i % 2 == 0 { 1e12 } else { 0.1 }).collect();
        long.extend_from_slice(&tail);

        let from_long = rolling_mean(&long, tail.len());
        let from_tail = rolling_mean(&tail, tail.len());
        assert_eq!(from_long.last(), from_tail.last());
        assert_eq!(from_tail[4], Some(1_040.0));
    }

    #[test]
    fn rolling_mean_window_longer_than_series() {
        assert_eq!(rolling_mean(&[1.0, 2.0], 3), vec![None, None]);
    }

    #[test]
    fn rolling_mean_zero_window() {
        assert_eq!(rolling_mean(&[1.0, 2.0], 0), vec![None, None]);
    }

    #[test]
    fn range_helpers() {
        let v = [3.0, 9.0, 1.0, 4.0];
        assert_eq!(highest(&v, 0, 4), Some(9.0));
        assert_eq!(lowest(&v, 1, 4), Some(1.0));
        assert_eq!(mean(&v, 2, 4), Some(2.5));
        assert_eq!(highest(&v, 2, 2), None);
        assert_eq!(mean(&v, 0, 5), None);
    }
}
