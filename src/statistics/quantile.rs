//! Sample quantiles for posterior summaries.
//!
//! Uses the Type 7 definition of Hyndman & Fan (1996), linear interpolation
//! between order statistics, which is the default of R's `quantile()` and of
//! most posterior summary tools:
//!
//! ```text
//! h = (n - 1) * p
//! q = x[floor(h)] + (h - floor(h)) * (x[floor(h) + 1] - x[floor(h)])
//! ```
//!
//! # Reference
//!
//! Hyndman, R. J. & Fan, Y. (1996). "Sample quantiles in statistical packages."
//! The American Statistician 50(4):361–365.

/// Quantile of already-sorted data.
///
/// # Panics
///
/// Panics if `sorted` is empty or if `p` is outside [0, 1].
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    assert!(!sorted.is_empty(), "Cannot compute quantile of empty slice");
    assert!(
        (0.0..=1.0).contains(&p),
        "Quantile probability must be in [0, 1]"
    );

    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Quantile of unsorted data. Copies and sorts once.
pub fn compute_quantile(data: &[f64], p: f64) -> f64 {
    let sorted = sorted_copy(data);
    quantile_sorted(&sorted, p)
}

/// Equal-tailed interval holding `level` of the mass: the
/// `(1-level)/2` and `1-(1-level)/2` quantiles.
pub fn equal_tailed_interval(sorted: &[f64], level: f64) -> (f64, f64) {
    let tail = (1.0 - level) / 2.0;
    (quantile_sorted(sorted, tail), quantile_sorted(sorted, 1.0 - tail))
}

/// Sorted copy of `data` (total order, NaN last).
pub fn sorted_copy(data: &[f64]) -> Vec<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_endpoints() {
        let data = [3.0, 1.0, 2.0, 5.0, 4.0];
        assert_eq!(compute_quantile(&data, 0.0), 1.0);
        assert_eq!(compute_quantile(&data, 1.0), 5.0);
        assert_eq!(compute_quantile(&data, 0.5), 3.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        // R: quantile(1:4, 0.25) == 1.75
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile_sorted(&sorted, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile_sorted(&sorted, 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_equal_tailed_interval() {
        let sorted: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        let (lo, hi) = equal_tailed_interval(&sorted, 0.95);
        assert!((lo - 2.5).abs() < 1e-12);
        assert!((hi - 97.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_element() {
        assert_eq!(quantile_sorted(&[7.0], 0.3), 7.0);
    }

    #[test]
    #[should_panic]
    fn test_empty_panics() {
        quantile_sorted(&[], 0.5);
    }
}
