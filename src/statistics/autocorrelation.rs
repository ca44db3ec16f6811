//! Autocorrelation and effective sample size of a Markov chain.

use super::mean;

/// Lag-k autocorrelation given the chain's mean and (biased) variance.
pub fn autocorrelation(chain: &[f64], k: usize, mean: f64, var: f64) -> f64 {
    let n = chain.len();
    if k >= n || var <= 0.0 {
        return 0.0;
    }

    let cov: f64 = (0..(n - k))
        .map(|i| (chain[i] - mean) * (chain[i + k] - mean))
        .sum::<f64>()
        / (n - k) as f64;

    cov / var
}

/// Effective sample size of one chain accounting for autocorrelation.
///
/// ESS = N / (1 + 2 Σ_k ρ_k), summing lags until ρ_k first drops below 0.05.
/// Never exceeds N.
///
/// Lags run up to N/2 rather than a fixed count: a slowly mixing ln σ chain
/// can stay correlated past lag 50, and cutting the sum there would
/// overstate ESS. Beyond N/2 fewer than half the draws enter each estimate.
pub fn effective_sample_size(chain: &[f64]) -> f64 {
    let n = chain.len();
    if n < 2 {
        return n as f64;
    }

    let m = mean(chain);
    let var = chain.iter().map(|&x| (x - m) * (x - m)).sum::<f64>() / n as f64;
    if var < 1e-300 {
        // Constant chain
        return n as f64;
    }

    let sum_rho: f64 = (1..=n / 2)
        .map(|k| autocorrelation(chain, k, m, var))
        .take_while(|&rho| rho >= 0.05)
        .sum();

    (n as f64 / (1.0 + 2.0 * sum_rho)).min(n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ess_autocorrelated() {
        let chain: Vec<f64> = (0..100).map(|i| (i as f64 * 0.1).sin()).collect();
        let ess = effective_sample_size(&chain);
        assert!(ess < 100.0);
        assert!(ess > 0.0);
    }

    #[test]
    fn test_ess_alternating_is_full() {
        // Negative lag-1 correlation stops the sum immediately
        let chain: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert_eq!(effective_sample_size(&chain), 100.0);
    }

    #[test]
    fn test_ess_constant_chain() {
        assert_eq!(effective_sample_size(&[2.0; 10]), 10.0);
    }

    #[test]
    fn test_ess_counts_correlation_past_lag_fifty() {
        // Blocks of 400 identical values: ρ_k ≈ 1 - k/200, so the sum runs
        // to lag ~190 and ESS ≈ 12 (a cap at lag 50 would give ≈ 27)
        let chain: Vec<f64> = (0..2400).map(|i| ((i / 400) % 2) as f64).collect();
        let ess = effective_sample_size(&chain);
        assert!(ess < 20.0, "ESS {}", ess);
    }

    #[test]
    fn test_lag_zero_is_one() {
        let chain = [1.0, 2.0, 3.0, 4.0];
        let mean = 2.5;
        let var = chain.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / 4.0;
        assert!((autocorrelation(&chain, 0, mean, var) - 1.0).abs() < 1e-12);
    }
}
