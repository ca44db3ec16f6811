//! # delay-bayes
//!
//! Bayesian regression of transit delay durations.
//!
//! This crate fits a normal linear model of delay duration on transit mode,
//! hour of day and day of week, and reports:
//! - Posterior summaries (mean, sd, median, credible interval) per coefficient
//! - Convergence diagnostics (trace, R-hat, effective sample size)
//! - Predicted delay per mode and hour
//! - In-sample goodness of fit (R², RMSE)
//!
//! Chains run in parallel, each with its own seeded random stream, so a
//! fixed seed reproduces a fit exactly.
//!
//! ## Quick Start
//!
//! ```ignore
//! use delay_bayes::{diagnose, fit, load_delay_csv, summarize, ModelSpec, SamplerConfig};
//! use std::path::Path;
//!
//! let dataset = load_delay_csv(Path::new("delays.csv"))?;
//! let spec = ModelSpec::transit_delay(&dataset.schema())?;
//! let fitted = fit(&dataset, &spec, &SamplerConfig::default())?;
//!
//! let diagnostics = diagnose(&fitted);
//! if !diagnostics.is_converged() {
//!     eprintln!("R-hat flagged: {:?}", diagnostics.flagged);
//! }
//! for row in summarize(&fitted) {
//!     println!("{:<16} {:>7.2} [{:.2}, {:.2}]", row.name, row.mean, row.lower, row.upper);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod constants;
mod error;
mod fitted;
mod posterior;
mod sampler;
mod types;

// Functional modules
pub mod analysis;
pub mod data;
pub mod model;
pub mod output;
pub mod statistics;

// Re-exports for public API
pub use analysis::{
    delay_by_hour, diagnose, diagnose_with_threshold, goodness_of_fit, potential_scale_reduction,
    predict, predict_interval, summarize, summarize_with_level, Diagnostics, GibbsBackend,
    GoodnessOfFit, HourlyPrediction, ParameterSummary, PredictionInterval,
};
pub use config::{SamplerConfig, SEED_ENV_VAR};
pub use constants::{DEFAULT_SEED, INTERCEPT, SIGMA};
pub use data::{load_delay_csv, DataError, DelayDataset};
pub use error::{FitWarning, ModelError};
pub use fitted::{FitMetadata, FittedModel};
pub use model::{DesignLayout, ModelSpec, ModelSpecBuilder, Prior, Term};
pub use output::Report;
pub use posterior::{ChainDraws, PosteriorDraws};
pub use sampler::{fit, fit_with_backend, ChainConfig, ChainOutput, RegressionProblem, SamplerBackend};
pub use types::{
    columns, Cell, ColumnKind, CovariateRow, CovariateSource, DayOfWeek, DelayEvent, Schema,
    TimeOfDay,
};
