//! Constants used throughout the crate.

/// Default deterministic seed for the per-chain random streams.
///
/// Same seed + same data + same configuration = bit-identical draws.
/// The value `0x64656C6179` is "delay" encoded in ASCII.
pub const DEFAULT_SEED: u64 = 0x64656C6179;

// =============================================================================
// Sampler defaults
// =============================================================================

/// Default number of independent Markov chains.
pub const DEFAULT_CHAINS: usize = 4;

/// Default number of warm-up (adaptation) iterations per chain, discarded.
pub const DEFAULT_WARMUP: usize = 1000;

/// Default number of retained iterations per chain.
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Default wall-clock budget for a whole fit call, in seconds.
pub const DEFAULT_TIME_BUDGET_SECS: u64 = 600;

/// Default fraction of retained draws allowed to diverge before warning.
pub const DEFAULT_MAX_DIVERGENCE_FRACTION: f64 = 0.01;

/// Target acceptance rate for the one-dimensional random-walk Metropolis step
/// on log σ (Roberts, Gelman & Gilks 1997).
pub const TARGET_ACCEPTANCE: f64 = 0.44;

/// Initial proposal standard deviation for the log σ random walk.
pub const INITIAL_LOG_SIGMA_STEP: f64 = 0.1;

// =============================================================================
// Priors
// =============================================================================

/// Scale of the Normal(0, s) prior on every coefficient group.
pub const DEFAULT_PRIOR_SCALE: f64 = 2.5;

/// Rate of the Exponential prior on the residual scale σ.
pub const DEFAULT_SIGMA_RATE: f64 = 1.0;

// =============================================================================
// Diagnostics and summaries
// =============================================================================

/// R-hat above this value flags a parameter as not converged.
pub const DEFAULT_RHAT_THRESHOLD: f64 = 1.1;

/// Default probability mass of reported credible intervals.
pub const DEFAULT_CREDIBLE_LEVEL: f64 = 0.95;

/// Design matrices whose X'X condition number exceeds this are rejected as
/// unidentifiable.
pub const CONDITION_NUMBER_LIMIT: f64 = 1e12;

/// Version tag written into persisted model artifacts.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Name of the intercept coefficient.
pub const INTERCEPT: &str = "(Intercept)";

/// Name of the residual scale parameter.
pub const SIGMA: &str = "sigma";
