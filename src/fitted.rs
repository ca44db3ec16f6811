//! The fitted-model bundle and its on-disk artifact.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{ARTIFACT_FORMAT_VERSION, SIGMA};
use crate::error::ModelError;
use crate::model::{DesignLayout, ModelSpec, ResolvedPriors};
use crate::posterior::PosteriorDraws;

/// Settings and bookkeeping recorded by the fit call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitMetadata {
    /// Rows in the training dataset.
    pub n_observations: usize,
    /// Chains run.
    pub chains: usize,
    /// Warm-up iterations per chain (discarded).
    pub warmup: usize,
    /// Retained iterations per chain.
    pub iterations: usize,
    /// Base seed of the chain streams.
    pub seed: u64,
    /// Name of the sampler backend.
    pub backend: String,
    /// Divergent transitions among retained draws, all chains.
    pub divergences: usize,
    /// Mean Metropolis acceptance rate over retained iterations.
    pub acceptance_rate: f64,
    /// Wall-clock duration of the fit, seconds.
    pub elapsed_secs: f64,
    /// Priors after autoscaling, one entry per coefficient.
    pub priors: ResolvedPriors,
    /// R-hat threshold used to flag non-convergence.
    pub rhat_threshold: f64,
    /// Divergence tolerance as a fraction of retained draws.
    pub max_divergence_fraction: f64,
    /// Credible interval level for summaries.
    pub credible_level: f64,
    /// Version of this crate that produced the fit.
    pub crate_version: String,
}

impl FitMetadata {
    /// Describe the first out-of-range setting, if any.
    fn invalid_setting(&self) -> Option<&'static str> {
        if !(self.rhat_threshold >= 1.0) {
            Some("rhat_threshold must be >= 1")
        } else if !(self.credible_level > 0.0 && self.credible_level < 1.0) {
            Some("credible_level must be in (0, 1)")
        } else if !(0.0..=1.0).contains(&self.max_divergence_fraction) {
            Some("max_divergence_fraction must be in [0, 1]")
        } else {
            None
        }
    }
}

/// Specification, encoding and posterior draws of one fit.
///
/// Immutable once created; share it by reference between the diagnostics,
/// summary and report code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    format_version: u32,
    spec: ModelSpec,
    layout: DesignLayout,
    draws: PosteriorDraws,
    metadata: FitMetadata,
}

impl FittedModel {
    /// Assemble a fitted model.
    ///
    /// # Errors
    /// `FitFailed` if the draws do not carry exactly the layout's
    /// coefficients followed by `sigma`; `Artifact` if the metadata holds an
    /// out-of-range threshold or credible level.
    pub fn from_parts(
        spec: ModelSpec,
        layout: DesignLayout,
        draws: PosteriorDraws,
        metadata: FitMetadata,
    ) -> Result<Self, ModelError> {
        let model = Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            spec,
            layout,
            draws,
            metadata,
        };
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<(), ModelError> {
        if let Some(message) = self.metadata.invalid_setting() {
            return Err(ModelError::Artifact {
                message: format!("invalid metadata: {}", message),
            });
        }
        self.draws.check()?;
        let names = self.draws.parameter_names();
        let coefs = self.layout.coefficient_names();
        let matches = names.len() == coefs.len() + 1
            && names[..coefs.len()] == *coefs
            && names[coefs.len()] == SIGMA;
        if !matches {
            return Err(ModelError::fit_failed(
                "posterior parameters do not match the design layout",
            ));
        }
        Ok(())
    }

    /// The model specification.
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Levels and coefficient order fixed at fit time.
    pub fn layout(&self) -> &DesignLayout {
        &self.layout
    }

    /// Posterior draws.
    pub fn draws(&self) -> &PosteriorDraws {
        &self.draws
    }

    /// Fit metadata.
    pub fn metadata(&self) -> &FitMetadata {
        &self.metadata
    }

    /// All parameter names: coefficients then `sigma`.
    pub fn parameter_names(&self) -> &[String] {
        self.draws.parameter_names()
    }

    /// Posterior means of the regression coefficients (without σ).
    pub fn coefficient_means(&self) -> Vec<f64> {
        let mut means = self.draws.means();
        means.truncate(self.layout.n_coefficients());
        means
    }

    /// Write the artifact as JSON.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let file = File::create(path).map_err(|e| artifact_error(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|e| artifact_error(path, e))?;
        writer.flush().map_err(|e| artifact_error(path, e))?;
        tracing::info!("saved fitted model to {}", path.display());
        Ok(())
    }

    /// Read an artifact written by [`save`](Self::save).
    ///
    /// # Errors
    /// `Artifact` on I/O or JSON errors, a format-version mismatch or
    /// out-of-range metadata; `FitFailed` if the stored draws are
    /// inconsistent.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path).map_err(|e| artifact_error(path, e))?;
        let model: FittedModel =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| artifact_error(path, e))?;
        if model.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ModelError::Artifact {
                message: format!(
                    "{}: format version {} is not supported (expected {})",
                    path.display(),
                    model.format_version,
                    ARTIFACT_FORMAT_VERSION
                ),
            });
        }
        model.check()?;
        tracing::debug!(
            "loaded fitted model from {} ({} chains, {} draws)",
            path.display(),
            model.draws.n_chains(),
            model.draws.total_draws()
        );
        Ok(model)
    }
}

fn artifact_error(path: &Path, err: impl std::fmt::Display) -> ModelError {
    ModelError::Artifact {
        message: format!("{}: {}", path.display(), err),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-built fits with known coefficients.

    use super::*;
    use crate::posterior::ChainDraws;
    use crate::types::{DayOfWeek, DelayEvent, Schema, TimeOfDay};

    fn event(duration: f64, mode: &str, hour: u8, day: DayOfWeek) -> DelayEvent {
        DelayEvent::new(duration, mode, TimeOfDay::at_hour(hour).unwrap(), day)
    }

    pub(crate) fn training() -> Vec<DelayEvent> {
        vec![
            event(10.0, "Bus", 7, DayOfWeek::Monday),
            event(7.0, "Subway", 7, DayOfWeek::Tuesday),
            event(12.0, "Bus", 8, DayOfWeek::Tuesday),
            event(9.0, "Subway", 8, DayOfWeek::Monday),
        ]
    }

    /// `duration ~ 1 + mode + time + day` over [`training`] with the given
    /// draws in one chain. Parameters: (Intercept), mode[Subway], time[08],
    /// day[Tuesday], sigma.
    pub(crate) fn fitted(draws: Vec<Vec<f64>>) -> FittedModel {
        fitted_with_divergences(draws, 0)
    }

    /// [`fitted`] with `divergences` recorded in the metadata.
    pub(crate) fn fitted_with_divergences(
        draws: Vec<Vec<f64>>,
        divergences: usize,
    ) -> FittedModel {
        let spec = ModelSpec::transit_delay(&Schema::delay_events()).unwrap();
        let layout = DesignLayout::from_rows(&spec, &training()).unwrap();
        let mut names = layout.coefficient_names().to_vec();
        names.push(SIGMA.into());
        let n_draws = draws.len();
        let posterior = PosteriorDraws::new(
            names,
            vec![ChainDraws {
                chain_id: 0,
                draws,
            }],
        )
        .unwrap();
        let metadata = FitMetadata {
            n_observations: 4,
            chains: 1,
            warmup: 0,
            iterations: n_draws,
            seed: 0,
            backend: "fixed".into(),
            divergences,
            acceptance_rate: 1.0,
            elapsed_secs: 0.0,
            priors: ResolvedPriors {
                means: vec![0.0; 4],
                scales: vec![2.5; 4],
                sigma_rate: 1.0,
            },
            rhat_threshold: 1.1,
            max_divergence_fraction: 0.01,
            credible_level: 0.95,
            crate_version: "test".into(),
        };
        FittedModel::from_parts(spec, layout, posterior, metadata).unwrap()
    }

    /// Reproduces [`training`] exactly: Bus/07/Monday = 10, Subway -3,
    /// hour 08 +2, Tuesday 0. The intercept draws straddle 10.
    pub(crate) fn exact_model() -> FittedModel {
        fitted(vec![
            vec![9.0, -3.0, 2.0, 0.0, 1.0],
            vec![11.0, -3.0, 2.0, 0.0, 1.0],
        ])
    }
}
