//! Descriptive statistics over posterior draws and data columns.
//!
//! - Moments ([`mean`], [`sample_variance`], [`sample_sd`])
//! - Quantiles and credible intervals ([`quantile_sorted`], [`equal_tailed_interval`])
//! - Autocorrelation-based effective sample size ([`effective_sample_size`])

mod autocorrelation;
mod quantile;

pub use autocorrelation::{autocorrelation, effective_sample_size};
pub use quantile::{compute_quantile, equal_tailed_interval, quantile_sorted, sorted_copy};

/// Arithmetic mean. `NaN` for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Unbiased sample variance (n − 1 denominator). `NaN` below two values.
pub fn sample_variance(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(data);
    data.iter().map(|&x| (x - m) * (x - m)).sum::<f64>() / (n - 1) as f64
}

/// Sample standard deviation (n − 1 denominator).
pub fn sample_sd(data: &[f64]) -> f64 {
    sample_variance(data).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moments() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&data), 5.0);
        assert!((sample_variance(&data) - 32.0 / 7.0).abs() < 1e-12);
        assert!((sample_sd(&data) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(mean(&[]).is_nan());
        assert!(sample_variance(&[1.0]).is_nan());
        assert_eq!(sample_variance(&[3.0, 3.0, 3.0]), 0.0);
    }
}
