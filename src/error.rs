//! Error and warning types.
//!
//! Hard failures ([`ModelError`]) abort the call that raised them. Sampling
//! quality problems ([`FitWarning`]) never abort: they ride along with the
//! diagnostics so degraded results are still reported.

use serde::{Deserialize, Serialize};

use crate::data::DataError;

/// Errors raised while specifying, fitting, persisting or querying a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The model specification references unknown columns or malformed priors.
    #[error("Invalid model specification: {message}")]
    InvalidSpec {
        /// What is wrong with the specification.
        message: String,
    },

    /// The input data cannot be fitted (empty, non-finite, unidentifiable design).
    #[error("Fit failed: {reason}")]
    FitFailed {
        /// Why the fit could not proceed.
        reason: String,
    },

    /// The wall-clock budget ran out before every chain finished.
    #[error("Fit exceeded its time budget of {budget_secs:.1}s")]
    FitTimeout {
        /// Budget that was exceeded, in seconds.
        budget_secs: f64,
    },

    /// A covariate row carries a level that was not present at fit time.
    #[error("Unknown level '{level}' for term '{term}'")]
    UnknownLevel {
        /// Term (column) name.
        term: String,
        /// Level that has no coefficient.
        level: String,
    },

    /// Sampler configuration is out of range.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        message: String,
    },

    /// Reading or writing a fitted-model artifact failed.
    #[error("Model artifact error: {message}")]
    Artifact {
        /// Description of the failure.
        message: String,
    },

    /// Loading the input dataset failed.
    #[error(transparent)]
    Data(#[from] DataError),
}

impl ModelError {
    pub(crate) fn invalid_spec(message: impl Into<String>) -> Self {
        ModelError::InvalidSpec {
            message: message.into(),
        }
    }

    pub(crate) fn fit_failed(reason: impl Into<String>) -> Self {
        ModelError::FitFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        ModelError::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Non-fatal sampling-quality findings attached to a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitWarning {
    /// More retained draws diverged than the configured tolerance.
    SamplerDivergence {
        /// Divergent transitions across all chains.
        count: usize,
        /// Total retained draws across all chains.
        total_draws: usize,
    },

    /// One or more parameters have R-hat above the threshold.
    NonConvergence {
        /// Parameters whose R-hat exceeded the threshold.
        parameters: Vec<String>,
        /// Threshold that was applied.
        threshold: f64,
    },
}

impl FitWarning {
    /// One-line human-readable description.
    pub fn describe(&self) -> String {
        match self {
            FitWarning::SamplerDivergence { count, total_draws } => format!(
                "{} of {} draws diverged; treat estimates as suspect",
                count, total_draws
            ),
            FitWarning::NonConvergence {
                parameters,
                threshold,
            } => format!(
                "R-hat > {:.2} for {} parameter(s): {}",
                threshold,
                parameters.len(),
                parameters.join(", ")
            ),
        }
    }
}
