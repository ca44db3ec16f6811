//! Declarative model specification.
//!
//! A [`ModelSpec`] is plain data: an outcome column, a list of predictor
//! terms and a prior for every coefficient group and for the residual scale.
//! It can be validated against a [`Schema`] and serialized without touching
//! any sampling code.
//!
//! The likelihood is always Normal:
//!
//! ```text
//! y_i ~ N(x_iᵀ β, σ²)
//! β_0 ~ intercept prior, β_j ~ prior of the term owning column j
//! σ   ~ Exponential(rate)
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PRIOR_SCALE, DEFAULT_SIGMA_RATE};
use crate::error::ModelError;
use crate::types::{columns, ColumnKind, Schema};

/// A named prior distribution with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Prior {
    /// Normal(mean, scale).
    Normal {
        /// Location.
        mean: f64,
        /// Standard deviation.
        scale: f64,
    },
    /// Exponential(rate), for positive scale parameters.
    Exponential {
        /// Rate (inverse mean).
        rate: f64,
    },
}

impl Prior {
    /// Weakly-informative coefficient prior, Normal(0, 2.5).
    pub fn weakly_informative() -> Self {
        Prior::Normal {
            mean: 0.0,
            scale: DEFAULT_PRIOR_SCALE,
        }
    }

    /// Residual-scale prior, Exponential(1).
    pub fn residual_scale() -> Self {
        Prior::Exponential {
            rate: DEFAULT_SIGMA_RATE,
        }
    }

    /// True when every parameter is finite and scales/rates are positive.
    pub fn is_proper(&self) -> bool {
        match *self {
            Prior::Normal { mean, scale } => mean.is_finite() && scale.is_finite() && scale > 0.0,
            Prior::Exponential { rate } => rate.is_finite() && rate > 0.0,
        }
    }
}

/// One predictor term of the linear predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Term {
    /// Reference-coded effect of a categorical column: one coefficient per
    /// non-reference level.
    Categorical {
        /// Column name.
        column: String,
        /// Prior shared by every level coefficient.
        prior: Prior,
    },
    /// Linear slope on a numeric column.
    Continuous {
        /// Column name.
        column: String,
        /// Prior on the slope.
        prior: Prior,
    },
}

impl Term {
    /// Column this term reads.
    pub fn column(&self) -> &str {
        match self {
            Term::Categorical { column, .. } | Term::Continuous { column, .. } => column,
        }
    }

    /// Prior on this term's coefficients.
    pub fn prior(&self) -> &Prior {
        match self {
            Term::Categorical { prior, .. } | Term::Continuous { prior, .. } => prior,
        }
    }

    fn expected_kind(&self) -> ColumnKind {
        match self {
            Term::Categorical { .. } => ColumnKind::Categorical,
            Term::Continuous { .. } => ColumnKind::Numeric,
        }
    }
}

/// The generative model: outcome, predictor terms and priors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Numeric outcome column.
    pub outcome: String,
    /// Predictor terms, in coefficient order.
    pub terms: Vec<Term>,
    /// Prior on the intercept.
    pub intercept_prior: Prior,
    /// Prior on the residual standard deviation σ.
    pub sigma_prior: Prior,
    /// Rescale Normal prior scales by the data (rstanarm-style): the
    /// intercept by sd(y), column j by sd(y)/sd(x_j), and the σ rate by
    /// 1/sd(y). The declared numbers are used verbatim when false.
    pub autoscale: bool,
}

impl ModelSpec {
    /// The transit delay model:
    ///
    /// `duration ~ 1 + mode + time + day`, Normal(0, 2.5) on every
    /// coefficient group and Exponential(1) on σ.
    ///
    /// # Errors
    /// `InvalidSpec` if the schema lacks one of the columns.
    pub fn transit_delay(schema: &Schema) -> Result<Self, ModelError> {
        ModelSpec::builder(columns::DURATION)
            .categorical(columns::MODE)
            .categorical(columns::TIME)
            .categorical(columns::DAY)
            .build(schema)
    }

    /// Start building a specification for `outcome`.
    pub fn builder(outcome: impl Into<String>) -> ModelSpecBuilder {
        ModelSpecBuilder::new(outcome)
    }

    /// Number of predictor terms (excluding the intercept).
    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    /// Check the specification against a schema.
    ///
    /// # Errors
    /// `InvalidSpec` when:
    /// - the outcome column is missing or not numeric,
    /// - a term references a missing column or one of the wrong kind,
    /// - a column appears in more than one term or is also the outcome,
    /// - a coefficient prior is not a proper Normal,
    /// - the σ prior is not a proper Exponential.
    pub fn validate(&self, schema: &Schema) -> Result<(), ModelError> {
        match schema.kind(&self.outcome) {
            None => {
                return Err(missing_column("outcome", &self.outcome, schema))
            }
            Some(ColumnKind::Categorical) => {
                return Err(ModelError::invalid_spec(format!(
                    "outcome column '{}' is not numeric",
                    self.outcome
                )))
            }
            Some(ColumnKind::Numeric) => {}
        }

        for (i, term) in self.terms.iter().enumerate() {
            let column = term.column();
            let kind = schema
                .kind(column)
                .ok_or_else(|| missing_column("term", column, schema))?;
            if kind != term.expected_kind() {
                return Err(ModelError::invalid_spec(format!(
                    "term column '{}' is {:?}, expected {:?}",
                    column,
                    kind,
                    term.expected_kind()
                )));
            }
            if column == self.outcome {
                return Err(ModelError::invalid_spec(format!(
                    "outcome column '{}' used as a predictor",
                    column
                )));
            }
            if self.terms[..i].iter().any(|t| t.column() == column) {
                return Err(ModelError::invalid_spec(format!(
                    "column '{}' appears in more than one term",
                    column
                )));
            }
            check_coefficient_prior(term.prior(), column)?;
        }

        check_coefficient_prior(&self.intercept_prior, "intercept")?;

        match self.sigma_prior {
            Prior::Exponential { .. } if self.sigma_prior.is_proper() => Ok(()),
            Prior::Exponential { rate } => Err(ModelError::invalid_spec(format!(
                "sigma prior rate must be finite and positive, got {}",
                rate
            ))),
            Prior::Normal { .. } => Err(ModelError::invalid_spec(
                "sigma prior must be Exponential",
            )),
        }
    }

    /// Render as an R-style formula, e.g. `duration ~ 1 + mode + time + day`.
    pub fn formula(&self) -> String {
        let mut rhs = vec!["1".to_string()];
        rhs.extend(self.terms.iter().map(|t| t.column().to_string()));
        format!("{} ~ {}", self.outcome, rhs.join(" + "))
    }
}

fn missing_column(role: &str, column: &str, schema: &Schema) -> ModelError {
    ModelError::invalid_spec(format!(
        "{} column '{}' not in schema (available: {})",
        role,
        column,
        schema.names().collect::<Vec<_>>().join(", ")
    ))
}

fn check_coefficient_prior(prior: &Prior, owner: &str) -> Result<(), ModelError> {
    match prior {
        Prior::Normal { mean, scale } if !prior.is_proper() => Err(ModelError::invalid_spec(
            format!(
                "prior for '{}' must have finite mean and positive scale, got Normal({}, {})",
                owner, mean, scale
            ),
        )),
        Prior::Normal { .. } => Ok(()),
        Prior::Exponential { .. } => Err(ModelError::invalid_spec(format!(
            "prior for '{}' must be Normal",
            owner
        ))),
    }
}

/// Builder for [`ModelSpec`].
#[derive(Debug, Clone)]
pub struct ModelSpecBuilder {
    outcome: String,
    terms: Vec<Term>,
    coefficient_prior: Prior,
    intercept_prior: Prior,
    sigma_prior: Prior,
    autoscale: bool,
}

impl ModelSpecBuilder {
    fn new(outcome: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            terms: Vec::new(),
            coefficient_prior: Prior::weakly_informative(),
            intercept_prior: Prior::weakly_informative(),
            sigma_prior: Prior::residual_scale(),
            autoscale: true,
        }
    }

    /// Set the prior used by terms added after this call.
    pub fn coefficient_prior(mut self, prior: Prior) -> Self {
        self.coefficient_prior = prior;
        self
    }

    /// Set the intercept prior.
    pub fn intercept_prior(mut self, prior: Prior) -> Self {
        self.intercept_prior = prior;
        self
    }

    /// Set the residual-scale prior.
    pub fn sigma_prior(mut self, prior: Prior) -> Self {
        self.sigma_prior = prior;
        self
    }

    /// Enable or disable data-dependent prior scaling.
    pub fn autoscale(mut self, autoscale: bool) -> Self {
        self.autoscale = autoscale;
        self
    }

    /// Add a categorical effect.
    pub fn categorical(mut self, column: impl Into<String>) -> Self {
        self.terms.push(Term::Categorical {
            column: column.into(),
            prior: self.coefficient_prior,
        });
        self
    }

    /// Add a continuous slope.
    pub fn continuous(mut self, column: impl Into<String>) -> Self {
        self.terms.push(Term::Continuous {
            column: column.into(),
            prior: self.coefficient_prior,
        });
        self
    }

    /// Validate against `schema` and produce the specification.
    pub fn build(self, schema: &Schema) -> Result<ModelSpec, ModelError> {
        let spec = ModelSpec {
            outcome: self.outcome,
            terms: self.terms,
            intercept_prior: self.intercept_prior,
            sigma_prior: self.sigma_prior,
            autoscale: self.autoscale,
        };
        spec.validate(schema)?;
        Ok(spec)
    }
}
