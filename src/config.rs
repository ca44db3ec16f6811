//! Configuration for posterior sampling, diagnostics and summaries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHAINS, DEFAULT_CREDIBLE_LEVEL, DEFAULT_ITERATIONS, DEFAULT_MAX_DIVERGENCE_FRACTION,
    DEFAULT_RHAT_THRESHOLD, DEFAULT_SEED, DEFAULT_TIME_BUDGET_SECS, DEFAULT_WARMUP,
};
use crate::error::ModelError;

/// Environment variable that overrides [`SamplerConfig::seed`].
pub const SEED_ENV_VAR: &str = "DELAY_BAYES_SEED";

/// Configuration options for [`fit`](crate::fit) and the downstream engines.
///
/// The defaults reproduce the reference analysis: 4 chains, 1,000 warm-up
/// and 1,000 retained iterations each, R-hat threshold 1.1, 95% intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    // =========================================================================
    // Chains
    // =========================================================================

    /// Number of independent Markov chains. Default: 4.
    pub chains: usize,

    /// Warm-up iterations per chain. The Metropolis step size adapts during
    /// warm-up and these draws are discarded. Default: 1,000.
    pub warmup: usize,

    /// Retained iterations per chain. Default: 1,000.
    pub iterations: usize,

    /// Base seed. Chain `k` uses the base stream advanced by `k` jumps, so
    /// chains are independent and a fixed seed reproduces the whole fit.
    pub seed: u64,

    /// Run chains on the rayon thread pool. When false, chains run one after
    /// another on the calling thread; results are identical either way.
    pub parallel: bool,

    // =========================================================================
    // Resource limits
    // =========================================================================

    /// Wall-clock budget for the whole fit call. Exceeding it fails the fit
    /// with `FitTimeout`. Default: 10 minutes.
    pub time_budget: Duration,

    // =========================================================================
    // Quality thresholds
    // =========================================================================

    /// R-hat above this flags a parameter as not converged. Default: 1.1.
    pub rhat_threshold: f64,

    /// Fraction of retained draws that may diverge before a
    /// `SamplerDivergence` warning is raised. Default: 0.01.
    pub max_divergence_fraction: f64,

    /// Probability mass of equal-tailed credible intervals. Default: 0.95.
    pub credible_level: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: DEFAULT_CHAINS,
            warmup: DEFAULT_WARMUP,
            iterations: DEFAULT_ITERATIONS,
            seed: DEFAULT_SEED,
            parallel: true,

            time_budget: Duration::from_secs(DEFAULT_TIME_BUDGET_SECS),

            rhat_threshold: DEFAULT_RHAT_THRESHOLD,
            max_divergence_fraction: DEFAULT_MAX_DIVERGENCE_FRACTION,
            credible_level: DEFAULT_CREDIBLE_LEVEL,
        }
    }
}

impl SamplerConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Short runs for development and tests:
    /// 4 chains, 250 warm-up, 250 retained, 60 second budget.
    pub fn quick() -> Self {
        Self {
            warmup: 250,
            iterations: 250,
            time_budget: Duration::from_secs(60),
            ..Default::default()
        }
    }

    /// Long runs for the final report:
    /// 4 chains, 2,000 warm-up, 4,000 retained, 30 minute budget.
    pub fn thorough() -> Self {
        Self {
            warmup: 2_000,
            iterations: 4_000,
            time_budget: Duration::from_secs(1_800),
            ..Default::default()
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the number of chains.
    pub fn chains(mut self, chains: usize) -> Self {
        assert!(chains > 0, "chains must be positive");
        self.chains = chains;
        self
    }

    /// Set the warm-up iterations per chain.
    pub fn warmup(mut self, iterations: usize) -> Self {
        self.warmup = iterations;
        self
    }

    /// Set the retained iterations per chain.
    pub fn iterations(mut self, iterations: usize) -> Self {
        assert!(iterations >= 2, "iterations must be at least 2");
        self.iterations = iterations;
        self
    }

    /// Set the base seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run chains in parallel (default) or sequentially.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the time budget.
    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    /// Set the time budget in seconds.
    pub fn time_budget_secs(mut self, secs: u64) -> Self {
        self.time_budget = Duration::from_secs(secs);
        self
    }

    /// Set the R-hat threshold.
    pub fn rhat_threshold(mut self, threshold: f64) -> Self {
        assert!(threshold >= 1.0, "rhat_threshold must be >= 1");
        self.rhat_threshold = threshold;
        self
    }

    /// Set the credible interval level.
    pub fn credible_level(mut self, level: f64) -> Self {
        assert!(level > 0.0 && level < 1.0, "credible_level must be in (0, 1)");
        self.credible_level = level;
        self
    }

    /// Set the divergence tolerance.
    pub fn max_divergence_fraction(mut self, fraction: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&fraction),
            "max_divergence_fraction must be in [0, 1]"
        );
        self.max_divergence_fraction = fraction;
        self
    }

    /// Apply overrides from the environment.
    ///
    /// `DELAY_BAYES_SEED` replaces the seed when it parses as a `u64`
    /// (decimal, or hexadecimal with a `0x` prefix). Unparseable values are
    /// ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(SEED_ENV_VAR) {
            match parse_seed(&raw) {
                Some(seed) => self.seed = seed,
                None => tracing::warn!("ignoring unparseable {}={:?}", SEED_ENV_VAR, raw),
            }
        }
        self
    }

    /// Total retained draws across all chains.
    pub fn total_draws(&self) -> usize {
        self.chains * self.iterations
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.chains == 0 {
            return Err(ModelError::invalid_config("chains must be positive"));
        }
        if self.iterations < 2 {
            return Err(ModelError::invalid_config("iterations must be at least 2"));
        }
        if self.chains == 1 && self.iterations < 4 {
            return Err(ModelError::invalid_config(
                "a single chain needs at least 4 iterations for split R-hat",
            ));
        }
        if !(self.rhat_threshold >= 1.0) {
            return Err(ModelError::invalid_config("rhat_threshold must be >= 1"));
        }
        if !(self.credible_level > 0.0 && self.credible_level < 1.0) {
            return Err(ModelError::invalid_config("credible_level must be in (0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.max_divergence_fraction) {
            return Err(ModelError::invalid_config(
                "max_divergence_fraction must be in [0, 1]",
            ));
        }
        if self.time_budget.is_zero() {
            return Err(ModelError::invalid_config("time_budget must be positive"));
        }
        Ok(())
    }
}

fn parse_seed(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SamplerConfig::default();
        assert_eq!(config.chains, 4);
        assert_eq!(config.warmup, 1_000);
        assert_eq!(config.iterations, 1_000);
        assert_eq!(config.rhat_threshold, 1.1);
        assert_eq!(config.credible_level, 0.95);
        assert!(config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_configs() {
        let quick = SamplerConfig::quick();
        assert_eq!(quick.iterations, 250);
        assert_eq!(quick.time_budget, Duration::from_secs(60));

        let thorough = SamplerConfig::thorough();
        assert_eq!(thorough.iterations, 4_000);
        assert_eq!(thorough.total_draws(), 16_000);
    }

    #[test]
    fn test_builder_methods() {
        let config = SamplerConfig::new()
            .chains(2)
            .warmup(100)
            .iterations(300)
            .seed(7)
            .parallel(false)
            .time_budget_secs(5);

        assert_eq!(config.chains, 2);
        assert_eq!(config.warmup, 100);
        assert_eq!(config.iterations, 300);
        assert_eq!(config.seed, 7);
        assert!(!config.parallel);
        assert_eq!(config.time_budget, Duration::from_secs(5));
    }

    #[test]
    fn test_validation() {
        let mut invalid = SamplerConfig::default();
        invalid.chains = 0;
        assert!(matches!(
            invalid.validate(),
            Err(ModelError::InvalidConfig { .. })
        ));

        let mut invalid = SamplerConfig::default();
        invalid.credible_level = 1.0;
        assert!(invalid.validate().is_err());

        let mut invalid = SamplerConfig::default();
        invalid.time_budget = Duration::ZERO;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed("42"), Some(42));
        assert_eq!(parse_seed(" 0x2A "), Some(42));
        assert_eq!(parse_seed("forty-two"), None);
    }

    #[test]
    #[should_panic]
    fn test_invalid_chains() {
        SamplerConfig::new().chains(0);
    }
}
