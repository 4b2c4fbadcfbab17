//! Local maxima over indicator or price columns.

/// Returns `true` if `values[k]` is strictly greater than every value within
/// `order` positions on either side. Undefined neighbours disqualify `k`.
pub fn is_local_max(values: &[Option<f64>], k: usize, order: usize) -> bool {
    if order == 0 || k < order || k + order >= values.len() {
        return false;
    }
    let Some(centre) = values[k] else {
        return false;
    };
    (k - order..=k + order)
        .filter(|&j| j != k)
        .all(|j| matches!(values[j], Some(v) if centre > v))
}

/// Peaks with index in `[from, upto - order]`, i.e. those already confirmed
/// by `order` later values at bar `upto`. Ascending order.
pub fn confirmed_peaks(values: &[Option<f64>], order: usize, from: usize, upto: usize) -> Vec<usize> {
    if upto < order || upto >= values.len() {
        return Vec::new();
    }
    let last = upto - order;
    (from..=last).filter(|&k| is_local_max(values, k, order)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn finds_strict_maximum() {
        let v = some(&[1.0, 2.0, 5.0, 2.0, 1.0]);
        assert!(is_local_max(&v, 2, 2));
        assert!(!is_local_max(&v, 1, 1));
    }

    #[test]
    fn plateau_is_not_a_peak() {
        let v = some(&[1.0, 3.0, 3.0, 1.0]);
        assert!(!is_local_max(&v, 1, 1));
        assert!(!is_local_max(&v, 2, 1));
    }

    #[test]
    fn edges_are_never_peaks() {
        let v = some(&[9.0, 1.0, 0.0]);
        assert!(!is_local_max(&v, 0, 1));
    }

    #[test]
    fn undefined_neighbour_disqualifies() {
        let v = vec![None, Some(2.0), Some(1.0)];
        assert!(!is_local_max(&v, 1, 1));
    }

    #[test]
    fn peak_is_confirmed_only_after_order_bars() {
        let v = some(&[1.0, 2.0, 3.0, 10.0, 3.0, 2.0, 1.0]);
        assert!(confirmed_peaks(&v, 3, 0, 5).is_empty());
        assert_eq!(confirmed_peaks(&v, 3, 0, 6), vec![3]);
    }

    #[test]
    fn respects_window_start() {
        let v = some(&[0.0, 5.0, 0.0, 6.0, 0.0, 7.0, 0.0]);
        assert_eq!(confirmed_peaks(&v, 1, 0, 6), vec![1, 3, 5]);
        assert_eq!(confirmed_peaks(&v, 1, 2, 6), vec![3, 5]);
    }
}
