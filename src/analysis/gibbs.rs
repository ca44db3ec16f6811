//! Metropolis-within-Gibbs sampler for the Normal linear model.
//!
//! Model:
//!
//! ```text
//! y | β, σ ~ N(Xβ, σ² I)
//! β_j ~ N(m_j, s_j²)
//! σ ~ Exponential(r)
//! ```
//!
//! Each iteration alternates between:
//! 1. β | σ, y ~ N(μ(σ), Q(σ)⁻¹) with Q(σ) = XᵀX/σ² + diag(1/s²) and
//!    μ(σ) = Q⁻¹ (Xᵀy/σ² + m/s²), drawn exactly through the Cholesky factor
//!    of Q.
//! 2. η = ln σ | β, y by random-walk Metropolis on the log density
//!    `-n η - SSR(β)/(2e^{2η}) - r e^η + η` (the last term is the Jacobian).
//!
//! The Metropolis step size adapts during warm-up toward acceptance 0.44
//! (Robbins-Monro on the log step) and is frozen for retained iterations.
//! Only sufficient statistics are touched inside the loop, so an iteration
//! costs O(p³) regardless of the number of rows.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use rand::Rng;
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::constants::{INITIAL_LOG_SIGMA_STEP, TARGET_ACCEPTANCE};
use crate::error::ModelError;
use crate::sampler::{ChainConfig, ChainOutput, RegressionProblem, SamplerBackend};

/// Iterations between wall-clock deadline checks.
const DEADLINE_CHECK_INTERVAL: usize = 50;

/// Bounds on the adapted log step size.
const LOG_STEP_MIN: f64 = -12.0;
const LOG_STEP_MAX: f64 = 3.0;

/// Decay exponent of the Robbins-Monro adaptation gain.
const ADAPTATION_DECAY: f64 = 0.6;

/// Default sampler backend.
#[derive(Debug, Clone, Copy)]
pub struct GibbsBackend {
    /// Half-width, on the log scale, of the uniform jitter applied to each
    /// chain's initial σ around sd(y). Overdispersed starts make R-hat
    /// informative.
    pub init_spread: f64,
}

impl Default for GibbsBackend {
    fn default() -> Self {
        Self { init_spread: 1.0 }
    }
}

impl SamplerBackend for GibbsBackend {
    fn name(&self) -> &'static str {
        "gibbs"
    }

    fn sample_chain(
        &self,
        problem: &RegressionProblem,
        chain: &ChainConfig,
    ) -> Result<ChainOutput, ModelError> {
        let mut sampler = GibbsSampler::new(problem, chain.rng());
        sampler.run(chain, self.init_spread)
    }
}

/// State of one chain.
struct GibbsSampler<'a> {
    problem: &'a RegressionProblem,

    /// Prior precisions 1/s².
    prior_precision: DVector<f64>,

    /// Prior precision times prior mean, m/s².
    prior_shift: DVector<f64>,

    /// Deterministic chain-local RNG.
    rng: Xoshiro256PlusPlus,

    /// Current log of the Metropolis proposal sd.
    log_step: f64,

    /// Divergences during the current phase.
    divergences: usize,
}

impl<'a> GibbsSampler<'a> {
    fn new(problem: &'a RegressionProblem, rng: Xoshiro256PlusPlus) -> Self {
        let prior_precision = problem.priors.precisions();
        let prior_shift = prior_precision.component_mul(&problem.priors.mean_vector());
        Self {
            problem,
            prior_precision,
            prior_shift,
            rng,
            log_step: INITIAL_LOG_SIGMA_STEP.ln(),
            divergences: 0,
        }
    }

    fn run(&mut self, chain: &ChainConfig, init_spread: f64) -> Result<ChainOutput, ModelError> {
        let total = chain.warmup + chain.iterations;
        let p = self.problem.n_coefficients();

        let mut retained: Vec<Vec<f64>> = Vec::with_capacity(chain.iterations);
        let mut accepted_retained = 0usize;

        // Overdispersed start for σ; β is drawn from its conditional first
        let jitter: f64 = self.rng.random_range(-init_spread..=init_spread);
        let mut log_sigma = self.problem.outcome_sd.ln() + jitter;

        for t in 0..total {
            if t % DEADLINE_CHECK_INTERVAL == 0 {
                chain.check_deadline()?;
            }
            let warming_up = t < chain.warmup;
            if t == chain.warmup {
                // Retained divergences only
                self.divergences = 0;
            }

            // Step 1: β | σ, y
            let beta = self.sample_beta_given_sigma(log_sigma.exp())?;

            // Step 2: ln σ | β, y
            let ssr = self.problem.stats.residual_sum_of_squares(&beta);
            let (next, accepted) = self.metropolis_log_sigma(log_sigma, ssr);
            log_sigma = next;

            if warming_up {
                let gain = 1.0 / ((t + 1) as f64).powf(ADAPTATION_DECAY);
                let indicator = if accepted { 1.0 } else { 0.0 };
                self.log_step = (self.log_step + gain * (indicator - TARGET_ACCEPTANCE))
                    .clamp(LOG_STEP_MIN, LOG_STEP_MAX);
            } else {
                if accepted {
                    accepted_retained += 1;
                }
                let mut draw = Vec::with_capacity(p + 1);
                draw.extend(beta.iter().copied());
                draw.push(log_sigma.exp());
                retained.push(draw);
            }
        }

        Ok(ChainOutput {
            chain_id: chain.chain_id,
            draws: retained,
            divergences: self.divergences,
            acceptance_rate: accepted_retained as f64 / chain.iterations.max(1) as f64,
        })
    }

    /// Draw β from its Gaussian full conditional.
    ///
    /// Q = XᵀX/σ² + diag(1/s²), μ = Q⁻¹ (Xᵀy/σ² + m/s²), β = μ + L⁻ᵀ z with
    /// Q = L Lᵀ and z ~ N(0, I).
    fn sample_beta_given_sigma(&mut self, sigma: f64) -> Result<DVector<f64>, ModelError> {
        let inv_var = 1.0 / (sigma * sigma);
        let stats = &self.problem.stats;

        let mut q: DMatrix<f64> = &stats.xtx * inv_var;
        for (j, prec) in self.prior_precision.iter().enumerate() {
            q[(j, j)] += prec;
        }
        let b = &stats.xty * inv_var + &self.prior_shift;

        let q_chol = self.factorize(q)?;
        let mu = q_chol.solve(&b);

        let z = self.sample_standard_normal_vector(mu.len());
        let offset = q_chol
            .l()
            .transpose()
            .solve_upper_triangular(&z)
            .ok_or_else(|| ModelError::fit_failed("singular posterior precision"))?;

        Ok(mu + offset)
    }

    /// Cholesky of the conditional precision, adding jitter when needed.
    /// Each jittered factorization counts as a divergence.
    fn factorize(&mut self, q: DMatrix<f64>) -> Result<Cholesky<f64, Dyn>, ModelError> {
        if let Some(chol) = Cholesky::new(q.clone()) {
            return Ok(chol);
        }
        let n = q.nrows();
        for &eps in &[1e-10, 1e-8, 1e-6, 1e-4] {
            let jittered = &q + DMatrix::<f64>::identity(n, n) * eps;
            if let Some(chol) = Cholesky::new(jittered) {
                self.divergences += 1;
                return Ok(chol);
            }
        }
        Err(ModelError::fit_failed(
            "posterior precision is not positive definite",
        ))
    }

    /// Log conditional density of η = ln σ, up to a constant.
    fn log_density_log_sigma(&self, eta: f64, ssr: f64) -> f64 {
        let n = self.problem.stats.n as f64;
        let rate = self.problem.priors.sigma_rate;
        -n * eta - ssr * (-2.0 * eta).exp() / 2.0 - rate * eta.exp() + eta
    }

    /// One random-walk Metropolis step on η. Returns the new state and
    /// whether the proposal was accepted. A proposal with a non-finite log
    /// density is rejected and counted as a divergence.
    fn metropolis_log_sigma(&mut self, eta: f64, ssr: f64) -> (f64, bool) {
        let z: f64 = self.rng.sample(StandardNormal);
        let proposal = eta + self.log_step.exp() * z;

        let current = self.log_density_log_sigma(eta, ssr);
        let proposed = self.log_density_log_sigma(proposal, ssr);
        if !proposed.is_finite() {
            self.divergences += 1;
            return (eta, false);
        }

        let log_alpha = proposed - current;
        let u: f64 = self.rng.random();
        if u.max(f64::MIN_POSITIVE).ln() < log_alpha {
            (proposal, true)
        } else {
            (eta, false)
        }
    }

    fn sample_standard_normal_vector(&mut self, len: usize) -> DVector<f64> {
        DVector::from_iterator(len, (0..len).map(|_| self.rng.sample(StandardNormal)))
    }
}
