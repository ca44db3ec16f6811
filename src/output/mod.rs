//! Report tables for a fitted model.
//!
//! [`Report`] gathers the summary, diagnostics, goodness of fit and hourly
//! predictions as plain data. Formatters:
//! - Terminal: human-readable tables with colors and box drawing
//! - JSON: machine-readable serialization for an external renderer

mod json;
mod terminal;

pub use json::{to_json, to_json_pretty};
pub use terminal::format_report;

use serde::{Deserialize, Serialize};

use crate::analysis::{
    delay_by_hour, diagnose, goodness_of_fit, summarize, Diagnostics, GoodnessOfFit,
    HourlyPrediction, ParameterSummary,
};
use crate::data::DelayDataset;
use crate::error::ModelError;
use crate::fitted::FittedModel;
use crate::types::columns;

/// Everything a report renderer needs from one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Model formula, e.g. `duration ~ 1 + mode + time + day`.
    pub formula: String,
    /// Rows the model was fitted on.
    pub n_observations: usize,
    /// Chains run.
    pub chains: usize,
    /// Retained draws per chain.
    pub iterations: usize,
    /// Posterior summary per parameter.
    pub summary: Vec<ParameterSummary>,
    /// Convergence diagnostics. The trace is only present when requested.
    pub diagnostics: Diagnostics,
    /// In-sample fit statistics, when the training data was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goodness_of_fit: Option<GoodnessOfFit>,
    /// Predicted delay per mode and hour.
    pub hourly: Vec<HourlyPrediction>,
}

impl Report {
    /// Build the report tables for `fitted`.
    ///
    /// Goodness of fit is computed only when `dataset` is given. Hourly
    /// predictions cover every mode level of the fit.
    pub fn build(
        fitted: &FittedModel,
        dataset: Option<&DelayDataset>,
        include_trace: bool,
    ) -> Result<Self, ModelError> {
        let metadata = fitted.metadata();

        let mut diagnostics = diagnose(fitted);
        if !include_trace {
            diagnostics.trace.clear();
        }

        let goodness_of_fit = dataset
            .map(|data| goodness_of_fit(fitted, data))
            .transpose()?;

        let modes: Vec<String> = fitted
            .layout()
            .levels(columns::MODE)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let hourly = delay_by_hour(fitted, &modes)?;

        Ok(Self {
            formula: fitted.spec().formula(),
            n_observations: metadata.n_observations,
            chains: metadata.chains,
            iterations: metadata.iterations,
            summary: summarize(fitted),
            diagnostics,
            goodness_of_fit,
            hourly,
        })
    }
}
