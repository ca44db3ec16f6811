//! Posterior analysis of a fitted delay model.
//!
//! 1. **Sampling** ([`gibbs`]): the default Metropolis-within-Gibbs backend
//! 2. **Diagnostics** ([`diagnostics`]): trace, R-hat, effective sample size
//! 3. **Summaries** ([`summary`]): parameter summaries, predictions, fit statistics

pub mod diagnostics;
pub mod gibbs;
pub mod summary;

pub use diagnostics::{diagnose, diagnose_with_threshold, potential_scale_reduction, Diagnostics};
pub use gibbs::GibbsBackend;
pub use summary::{
    delay_by_hour, fit_statistics, goodness_of_fit, predict, predict_interval, summarize,
    summarize_with_level, GoodnessOfFit, HourlyPrediction, ParameterSummary, PredictionInterval,
};
