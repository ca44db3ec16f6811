//! Convergence diagnostics: trace, R-hat, effective sample size.
//!
//! R-hat compares between-chain and within-chain variance (Gelman & Rubin):
//!
//! ```text
//! W = mean of per-chain sample variances
//! B = N * variance of chain means
//! R = sqrt(((N - 1)/N * W + B/N) / W)
//! ```
//!
//! Values near 1 mean the chains agree; values above the threshold (1.1 by
//! default) flag the parameter as not converged. Flagging never fails a
//! call: it becomes a [`FitWarning::NonConvergence`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FitWarning;
use crate::fitted::FittedModel;
use crate::statistics::{effective_sample_size, mean, sample_variance};

/// Diagnostics of one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Per parameter, one draw sequence per chain in original order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub trace: BTreeMap<String, Vec<Vec<f64>>>,
    /// Potential scale reduction per parameter.
    pub rhat: BTreeMap<String, f64>,
    /// Effective sample size per parameter, summed over chains.
    pub ess: BTreeMap<String, f64>,
    /// Parameters with R-hat above the threshold or non-finite, in
    /// parameter order.
    pub flagged: Vec<String>,
    /// Divergent transitions recorded by the sampler.
    pub divergences: usize,
    /// R-hat threshold applied.
    pub threshold: f64,
    /// Non-fatal findings.
    pub warnings: Vec<FitWarning>,
}

impl Diagnostics {
    /// True when no parameter is flagged.
    pub fn is_converged(&self) -> bool {
        self.flagged.is_empty()
    }

    /// Largest R-hat over all parameters (`NaN` propagates as +∞).
    pub fn max_rhat(&self) -> f64 {
        self.rhat
            .values()
            .map(|&r| if r.is_finite() { r } else { f64::INFINITY })
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Smallest effective sample size over all parameters.
    pub fn min_ess(&self) -> f64 {
        self.ess.values().copied().fold(f64::INFINITY, f64::min)
    }
}

/// Diagnose a fit with the threshold recorded in its metadata.
pub fn diagnose(fitted: &FittedModel) -> Diagnostics {
    diagnose_with_threshold(fitted, fitted.metadata().rhat_threshold)
}

/// Diagnose a fit with an explicit R-hat threshold.
pub fn diagnose_with_threshold(fitted: &FittedModel, threshold: f64) -> Diagnostics {
    let draws = fitted.draws();
    let metadata = fitted.metadata();

    let mut trace = BTreeMap::new();
    let mut rhat = BTreeMap::new();
    let mut ess = BTreeMap::new();
    let mut flagged = Vec::new();

    for (idx, name) in draws.parameter_names().iter().enumerate() {
        let chains = draws.trace(idx);
        let views: Vec<&[f64]> = chains.iter().map(Vec::as_slice).collect();

        let r = potential_scale_reduction(&views);
        if !r.is_finite() || r > threshold {
            flagged.push(name.clone());
        }
        let n_eff: f64 = views.iter().map(|c| effective_sample_size(c)).sum();

        rhat.insert(name.clone(), r);
        ess.insert(name.clone(), n_eff);
        trace.insert(name.clone(), chains);
    }

    let mut warnings = Vec::new();
    let total_draws = draws.total_draws();
    let tolerated = metadata.max_divergence_fraction * total_draws as f64;
    if metadata.divergences > 0 && metadata.divergences as f64 > tolerated {
        tracing::warn!(
            "{} divergent transitions exceed {:.1}% of {} draws",
            metadata.divergences,
            metadata.max_divergence_fraction * 100.0,
            total_draws
        );
        warnings.push(FitWarning::SamplerDivergence {
            count: metadata.divergences,
            total_draws,
        });
    }
    if !flagged.is_empty() {
        tracing::warn!(
            "R-hat above {:.2} for: {}",
            threshold,
            flagged.join(", ")
        );
        warnings.push(FitWarning::NonConvergence {
            parameters: flagged.clone(),
            threshold,
        });
    }

    Diagnostics {
        trace,
        rhat,
        ess,
        flagged,
        divergences: metadata.divergences,
        threshold,
        warnings,
    }
}

/// Potential scale reduction factor of one parameter.
///
/// Each chain's variance is computed on its own before pooling. A single
/// chain is split into halves so the statistic stays defined. Returns 1 when
/// every draw is identical, +∞ when chains are individually constant but
/// disagree, and `NaN` when a chain has fewer than two draws.
pub fn potential_scale_reduction(chains: &[&[f64]]) -> f64 {
    let split: Vec<&[f64]>;
    let chains = if chains.len() == 1 {
        let chain = chains[0];
        let half = chain.len() / 2;
        split = vec![&chain[..half], &chain[chain.len() - half..]];
        split.as_slice()
    } else {
        chains
    };

    if chains.len() < 2 {
        return f64::NAN;
    }
    // Equal lengths are guaranteed by fit; use the shortest otherwise
    let n = chains.iter().map(|c| c.len()).min().unwrap_or(0);
    if n < 2 {
        return f64::NAN;
    }
    let chains: Vec<&[f64]> = chains.iter().map(|c| &c[..n]).collect();

    let means: Vec<f64> = chains.iter().map(|c| mean(c)).collect();
    let within: Vec<f64> = chains.iter().map(|c| sample_variance(c)).collect();

    let n_f = n as f64;
    let w = mean(&within);
    let b = n_f * sample_variance(&means);

    if w <= 0.0 {
        return if b <= 0.0 { 1.0 } else { f64::INFINITY };
    }

    let var_plus = (n_f - 1.0) / n_f * w + b / n_f;
    (var_plus / w).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitted::fixtures::fitted_with_divergences;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn normal_stream(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        (0..n).map(|_| rng.sample(StandardNormal)).collect()
    }

    /// 200 draws in one chain; only the intercept varies, by alternation.
    fn steady_draws() -> Vec<Vec<f64>> {
        (0..200)
            .map(|i| vec![10.0 + (i % 2) as f64, -3.0, 2.0, 0.0, 1.0])
            .collect()
    }

    fn divergence_warnings(diagnostics: &Diagnostics) -> Vec<&FitWarning> {
        diagnostics
            .warnings
            .iter()
            .filter(|w| matches!(w, FitWarning::SamplerDivergence { .. }))
            .collect()
    }

    #[test]
    fn test_divergences_within_tolerance_do_not_warn() {
        // 1% of 200 draws tolerates exactly 2
        let model = fitted_with_divergences(steady_draws(), 2);
        let diagnostics = diagnose(&model);
        assert_eq!(diagnostics.divergences, 2);
        assert!(divergence_warnings(&diagnostics).is_empty());
        assert!(diagnostics.is_converged());
    }

    #[test]
    fn test_divergences_above_tolerance_warn() {
        let model = fitted_with_divergences(steady_draws(), 3);
        let diagnostics = diagnose(&model);
        assert_eq!(diagnostics.divergences, 3);
        assert_eq!(
            divergence_warnings(&diagnostics),
            vec![&FitWarning::SamplerDivergence {
                count: 3,
                total_draws: 200
            }]
        );
        // Divergences alone do not flag convergence
        assert!(diagnostics.is_converged());
    }

    #[test]
    fn test_rhat_same_distribution() {
        let stream = normal_stream(7, 4000);
        let chains: Vec<&[f64]> = stream.chunks(1000).collect();
        let r = potential_scale_reduction(&chains);
        assert!((r - 1.0).abs() < 0.01, "R-hat {}", r);
    }

    #[test]
    fn test_rhat_disjoint_chains() {
        let a: Vec<f64> = normal_stream(1, 500);
        let b: Vec<f64> = normal_stream(2, 500).iter().map(|v| v + 10.0).collect();
        let r = potential_scale_reduction(&[&a, &b]);
        assert!(r > 1.1, "R-hat {}", r);
    }

    #[test]
    fn test_rhat_hand_computed() {
        // Chain means 2 and 5, within variances 1 and 1, N = 3
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        // W = 1, B = 3 * 4.5 = 13.5, V = 2/3 + 4.5 = 5.1667
        let expected = ((2.0 / 3.0) + 4.5_f64).sqrt();
        let r = potential_scale_reduction(&[&a, &b]);
        assert!((r - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rhat_constant_chains() {
        assert_eq!(potential_scale_reduction(&[&[2.0, 2.0], &[2.0, 2.0]]), 1.0);
        assert_eq!(
            potential_scale_reduction(&[&[1.0, 1.0], &[2.0, 2.0]]),
            f64::INFINITY
        );
    }

    #[test]
    fn test_rhat_single_chain_splits() {
        let stream = normal_stream(3, 2000);
        let r = potential_scale_reduction(&[&stream]);
        assert!(r.is_finite() && (r - 1.0).abs() < 0.02, "R-hat {}", r);

        // A drifting chain disagrees with itself
        let drift: Vec<f64> = (0..200).map(|i| i as f64).collect();
        assert!(potential_scale_reduction(&[&drift]) > 1.1);
    }

    #[test]
    fn test_rhat_too_short() {
        assert!(potential_scale_reduction(&[&[1.0], &[2.0]]).is_nan());
        assert!(potential_scale_reduction(&[]).is_nan());
    }
}
