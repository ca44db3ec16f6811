//! Design-matrix encoding of a [`ModelSpec`] over observed rows.
//!
//! Categorical terms use reference (treatment) coding: levels are the
//! distinct observed values in sorted order (weekdays Monday-first), the
//! first level is absorbed into the intercept, and every other level gets
//! one indicator column named `column[level]`. Continuous terms contribute
//! their raw value under the column name.

use nalgebra::{Cholesky, DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::constants::{CONDITION_NUMBER_LIMIT, INTERCEPT};
use crate::error::ModelError;
use crate::model::spec::{ModelSpec, Prior, Term};
use crate::statistics::sample_sd;
use crate::types::{Cell, CovariateSource, DayOfWeek};

/// A term after its levels have been fixed from training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodedTerm {
    /// Reference-coded categorical term.
    Categorical {
        /// Column name.
        column: String,
        /// All levels; `levels[0]` is the reference.
        levels: Vec<String>,
        /// Index of this term's first coefficient.
        offset: usize,
    },
    /// Continuous slope.
    Continuous {
        /// Column name.
        column: String,
        /// Index of the slope coefficient.
        offset: usize,
    },
}

impl EncodedTerm {
    /// Column this term reads.
    pub fn column(&self) -> &str {
        match self {
            EncodedTerm::Categorical { column, .. } | EncodedTerm::Continuous { column, .. } => {
                column
            }
        }
    }
}

/// Mapping from covariates to coefficient positions, fixed at fit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignLayout {
    terms: Vec<EncodedTerm>,
    coefficient_names: Vec<String>,
}

impl DesignLayout {
    /// Fix levels and coefficient order from the training rows.
    ///
    /// # Errors
    /// `InvalidSpec` if a row cannot supply a term's column, or supplies a
    /// value of the wrong kind.
    pub fn from_rows<S: CovariateSource>(spec: &ModelSpec, rows: &[S]) -> Result<Self, ModelError> {
        let mut terms = Vec::with_capacity(spec.terms.len());
        let mut coefficient_names = vec![INTERCEPT.to_string()];

        for term in &spec.terms {
            let offset = coefficient_names.len();
            match term {
                Term::Categorical { column, .. } => {
                    let mut levels = Vec::new();
                    for row in rows {
                        match row.cell(column) {
                            Some(Cell::Level(level)) => levels.push(level),
                            Some(Cell::Numeric(_)) => {
                                return Err(ModelError::invalid_spec(format!(
                                    "column '{}' is numeric but used as categorical",
                                    column
                                )))
                            }
                            None => return Err(missing_column(column)),
                        }
                    }
                    sort_levels(&mut levels);
                    coefficient_names.extend(
                        levels
                            .iter()
                            .skip(1)
                            .map(|level| format!("{}[{}]", column, level)),
                    );
                    terms.push(EncodedTerm::Categorical {
                        column: column.clone(),
                        levels,
                        offset,
                    });
                }
                Term::Continuous { column, .. } => {
                    coefficient_names.push(column.clone());
                    terms.push(EncodedTerm::Continuous {
                        column: column.clone(),
                        offset,
                    });
                }
            }
        }

        Ok(Self {
            terms,
            coefficient_names,
        })
    }

    /// Number of regression coefficients, intercept included.
    pub fn n_coefficients(&self) -> usize {
        self.coefficient_names.len()
    }

    /// Coefficient names in design-column order.
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    /// Encoded terms in specification order.
    pub fn terms(&self) -> &[EncodedTerm] {
        &self.terms
    }

    /// All levels of a categorical column (reference first), if encoded.
    pub fn levels(&self, column: &str) -> Option<&[String]> {
        self.terms.iter().find_map(|t| match t {
            EncodedTerm::Categorical {
                column: c, levels, ..
            } if c == column => Some(levels.as_slice()),
            _ => None,
        })
    }

    /// Encode one row as a design vector (leading 1 for the intercept).
    ///
    /// # Errors
    /// `UnknownLevel` for a level not seen at fit time; `InvalidSpec` if the
    /// row lacks a column or has the wrong kind of value.
    pub fn encode<S: CovariateSource>(&self, row: &S) -> Result<Vec<f64>, ModelError> {
        let mut x = vec![0.0; self.n_coefficients()];
        x[0] = 1.0;
        for term in &self.terms {
            match term {
                EncodedTerm::Categorical {
                    column,
                    levels,
                    offset,
                } => {
                    let level = match row.cell(column) {
                        Some(Cell::Level(level)) => level,
                        Some(Cell::Numeric(_)) => {
                            return Err(ModelError::invalid_spec(format!(
                                "column '{}' is numeric but used as categorical",
                                column
                            )))
                        }
                        None => return Err(missing_column(column)),
                    };
                    let idx = levels.iter().position(|l| *l == level).ok_or_else(|| {
                        ModelError::UnknownLevel {
                            term: column.clone(),
                            level: level.clone(),
                        }
                    })?;
                    // Reference level has no indicator
                    if idx > 0 {
                        x[offset + idx - 1] = 1.0;
                    }
                }
                EncodedTerm::Continuous { column, offset } => match row.cell(column) {
                    Some(Cell::Numeric(value)) => x[*offset] = value,
                    Some(Cell::Level(_)) => {
                        return Err(ModelError::invalid_spec(format!(
                            "column '{}' is categorical but used as continuous",
                            column
                        )))
                    }
                    None => return Err(missing_column(column)),
                },
            }
        }
        Ok(x)
    }

    /// Encode many rows into an `n × p` design matrix.
    pub fn design_matrix<S: CovariateSource>(&self, rows: &[S]) -> Result<DMatrix<f64>, ModelError> {
        let p = self.n_coefficients();
        let mut x = DMatrix::zeros(rows.len(), p);
        for (i, row) in rows.iter().enumerate() {
            let encoded = self.encode(row)?;
            for (j, value) in encoded.into_iter().enumerate() {
                x[(i, j)] = value;
            }
        }
        Ok(x)
    }
}

fn missing_column(column: &str) -> ModelError {
    ModelError::invalid_spec(format!("rows have no column '{}'", column))
}

/// Deduplicate and order levels: weekdays Monday-first, anything else
/// lexicographically.
fn sort_levels(levels: &mut Vec<String>) {
    levels.sort_by_key(|l| (l.parse::<DayOfWeek>().ok(), l.clone()));
    levels.dedup();
}

/// Sufficient statistics of the Normal linear model.
#[derive(Debug, Clone)]
pub struct SufficientStats {
    /// XᵀX.
    pub xtx: DMatrix<f64>,
    /// Xᵀy.
    pub xty: DVector<f64>,
    /// yᵀy.
    pub yty: f64,
    /// Number of observations.
    pub n: usize,
}

impl SufficientStats {
    /// Compute from a design matrix and outcome vector.
    pub fn new(x: &DMatrix<f64>, y: &DVector<f64>) -> Self {
        Self {
            xtx: x.transpose() * x,
            xty: x.transpose() * y,
            yty: y.dot(y),
            n: y.len(),
        }
    }

    /// Residual sum of squares ‖y − Xβ‖² evaluated from the statistics.
    pub fn residual_sum_of_squares(&self, beta: &DVector<f64>) -> f64 {
        let ssr = self.yty - 2.0 * beta.dot(&self.xty) + beta.dot(&(&self.xtx * beta));
        ssr.max(0.0)
    }
}

/// Reject designs whose XᵀX is singular or numerically close to it.
///
/// Uses the Cholesky diagonal: for SPD A = LLᵀ, cond(A) ≈ (max Lᵢᵢ / min Lᵢᵢ)².
pub fn check_identifiable(stats: &SufficientStats) -> Result<(), ModelError> {
    let p = stats.xtx.nrows();
    if stats.n < p {
        return Err(ModelError::fit_failed(format!(
            "{} observations cannot identify {} coefficients",
            stats.n, p
        )));
    }
    let chol = Cholesky::new(stats.xtx.clone()).ok_or_else(|| {
        ModelError::fit_failed("design matrix is rank deficient (collinear columns)")
    })?;
    let l = chol.l();
    let diag: Vec<f64> = (0..p).map(|i| l[(i, i)].abs()).collect();
    let max_l = diag.iter().cloned().fold(0.0_f64, f64::max);
    let min_l = diag.iter().cloned().fold(f64::INFINITY, f64::min);
    if min_l < 1e-12 {
        return Err(ModelError::fit_failed(
            "design matrix is rank deficient (collinear columns)",
        ));
    }
    let cond = (max_l / min_l).powi(2);
    if cond > CONDITION_NUMBER_LIMIT {
        return Err(ModelError::fit_failed(format!(
            "design matrix is ill-conditioned (condition number {:.2e})",
            cond
        )));
    }
    Ok(())
}

/// Prior parameters per coefficient after autoscaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPriors {
    /// Prior mean per coefficient.
    pub means: Vec<f64>,
    /// Prior standard deviation per coefficient.
    pub scales: Vec<f64>,
    /// Rate of the Exponential prior on σ.
    pub sigma_rate: f64,
}

impl ResolvedPriors {
    /// Resolve the priors of `spec` for the encoded design.
    ///
    /// With autoscaling, the intercept scale is multiplied by sd(y), column
    /// j by sd(y)/sd(x_j) (sd(y) when the column is constant), and the σ
    /// rate is divided by sd(y). A constant outcome scales by 1.
    pub fn resolve(
        spec: &ModelSpec,
        layout: &DesignLayout,
        x: &DMatrix<f64>,
        y: &[f64],
    ) -> Result<Self, ModelError> {
        let p = layout.n_coefficients();
        let mut means = vec![0.0; p];
        let mut scales = vec![0.0; p];

        let sd_y = match sample_sd(y) {
            sd if sd.is_finite() && sd > 0.0 => sd,
            _ => 1.0,
        };

        let (m0, s0) = normal_parameters(&spec.intercept_prior)?;
        means[0] = m0;
        scales[0] = if spec.autoscale { s0 * sd_y } else { s0 };

        for (term, encoded) in spec.terms.iter().zip(layout.terms()) {
            let (m, s) = normal_parameters(term.prior())?;
            let (offset, width) = match encoded {
                EncodedTerm::Categorical { levels, offset, .. } => {
                    (*offset, levels.len().saturating_sub(1))
                }
                EncodedTerm::Continuous { offset, .. } => (*offset, 1),
            };
            for j in offset..offset + width {
                means[j] = m;
                scales[j] = if spec.autoscale {
                    let column: Vec<f64> = x.column(j).iter().copied().collect();
                    match sample_sd(&column) {
                        sd_x if sd_x.is_finite() && sd_x > 0.0 => s * sd_y / sd_x,
                        _ => s * sd_y,
                    }
                } else {
                    s
                };
            }
        }

        let sigma_rate = match spec.sigma_prior {
            Prior::Exponential { rate } if spec.autoscale => rate / sd_y,
            Prior::Exponential { rate } => rate,
            Prior::Normal { .. } => {
                return Err(ModelError::invalid_spec("sigma prior must be Exponential"))
            }
        };

        Ok(Self {
            means,
            scales,
            sigma_rate,
        })
    }

    /// Prior precisions 1/scale².
    pub fn precisions(&self) -> DVector<f64> {
        DVector::from_iterator(self.scales.len(), self.scales.iter().map(|s| 1.0 / (s * s)))
    }

    /// Prior means as a vector.
    pub fn mean_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.means)
    }
}

fn normal_parameters(prior: &Prior) -> Result<(f64, f64), ModelError> {
    match *prior {
        Prior::Normal { mean, scale } => Ok((mean, scale)),
        Prior::Exponential { .. } => Err(ModelError::invalid_spec(
            "coefficient priors must be Normal",
        )),
    }
}

/// Standard deviation of the outcome (1 when constant), the centre of each
/// chain's initial σ.
pub(crate) fn outcome_spread(y: &[f64]) -> f64 {
    match sample_sd(y) {
        sd if sd.is_finite() && sd > 0.0 => sd,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CovariateRow, DelayEvent, Schema, TimeOfDay};

    fn event(duration: f64, mode: &str, hour: u8, day: DayOfWeek) -> DelayEvent {
        DelayEvent::new(duration, mode, TimeOfDay::at_hour(hour).unwrap(), day)
    }

    fn rows() -> Vec<DelayEvent> {
        vec![
            event(10.0, "Subway", 8, DayOfWeek::Tuesday),
            event(12.0, "Bus", 7, DayOfWeek::Monday),
            event(15.0, "Streetcar", 8, DayOfWeek::Monday),
            event(11.0, "Bus", 9, DayOfWeek::Sunday),
        ]
    }

    #[test]
    fn test_reference_coding_names() {
        let spec = ModelSpec::transit_delay(&Schema::delay_events()).unwrap();
        let layout = DesignLayout::from_rows(&spec, &rows()).unwrap();
        assert_eq!(
            layout.coefficient_names(),
            &[
                "(Intercept)",
                "mode[Streetcar]",
                "mode[Subway]",
                "time[08]",
                "time[09]",
                "day[Tuesday]",
                "day[Sunday]",
            ]
        );
        assert_eq!(
            layout.levels("day").unwrap(),
            &["Monday", "Tuesday", "Sunday"]
        );
    }

    #[test]
    fn test_encode_row() {
        let spec = ModelSpec::transit_delay(&Schema::delay_events()).unwrap();
        let layout = DesignLayout::from_rows(&spec, &rows()).unwrap();

        let reference = CovariateRow::new("Bus", TimeOfDay::at_hour(7).unwrap(), DayOfWeek::Monday);
        assert_eq!(layout.encode(&reference).unwrap(), vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let other = CovariateRow::new("Subway", TimeOfDay::new(9, 30, 0).unwrap(), DayOfWeek::Sunday);
        assert_eq!(layout.encode(&other).unwrap(), vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unknown_level() {
        let spec = ModelSpec::transit_delay(&Schema::delay_events()).unwrap();
        let layout = DesignLayout::from_rows(&spec, &rows()).unwrap();
        let row = CovariateRow::new("Ferry", TimeOfDay::at_hour(7).unwrap(), DayOfWeek::Monday);
        match layout.encode(&row) {
            Err(ModelError::UnknownLevel { term, level }) => {
                assert_eq!(term, "mode");
                assert_eq!(level, "Ferry");
            }
            other => panic!("expected UnknownLevel, got {:?}", other),
        }
    }

    #[test]
    fn test_continuous_term() {
        let spec = ModelSpec::builder("duration")
            .continuous("hour")
            .build(&Schema::delay_events())
            .unwrap();
        let layout = DesignLayout::from_rows(&spec, &rows()).unwrap();
        let x = layout.design_matrix(&rows()).unwrap();
        assert_eq!(x.shape(), (4, 2));
        assert_eq!(x[(1, 1)], 7.0);
    }

    #[test]
    fn test_collinear_design_rejected() {
        // Every Bus row is on Monday and every Subway row on Tuesday, so
        // mode[Subway] and day[Tuesday] are the same column.
        let data = vec![
            event(1.0, "Bus", 7, DayOfWeek::Monday),
            event(2.0, "Bus", 7, DayOfWeek::Monday),
            event(3.0, "Subway", 7, DayOfWeek::Tuesday),
            event(4.0, "Subway", 7, DayOfWeek::Tuesday),
        ];
        let spec = ModelSpec::builder("duration")
            .categorical("mode")
            .categorical("day")
            .build(&Schema::delay_events())
            .unwrap();
        let layout = DesignLayout::from_rows(&spec, &data).unwrap();
        let x = layout.design_matrix(&data).unwrap();
        let y = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let stats = SufficientStats::new(&x, &y);
        assert!(matches!(
            check_identifiable(&stats),
            Err(ModelError::FitFailed { .. })
        ));
    }

    #[test]
    fn test_residual_sum_of_squares() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_vec(vec![1.0, 3.0, 5.0]);
        let stats = SufficientStats::new(&x, &y);
        let exact = DVector::from_vec(vec![1.0, 2.0]);
        assert!(stats.residual_sum_of_squares(&exact) < 1e-12);
        let off = DVector::from_vec(vec![0.0, 2.0]);
        assert!((stats.residual_sum_of_squares(&off) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_autoscaled_priors() {
        let spec = ModelSpec::transit_delay(&Schema::delay_events()).unwrap();
        let data = rows();
        let layout = DesignLayout::from_rows(&spec, &data).unwrap();
        let x = layout.design_matrix(&data).unwrap();
        let y: Vec<f64> = data.iter().map(|e| e.duration).collect();
        let sd_y = sample_sd(&y);

        let priors = ResolvedPriors::resolve(&spec, &layout, &x, &y).unwrap();
        assert!((priors.scales[0] - 2.5 * sd_y).abs() < 1e-12);
        assert!((priors.sigma_rate - 1.0 / sd_y).abs() < 1e-12);
        assert!(priors.scales.iter().all(|s| *s > 0.0));

        let fixed = ModelSpec {
            autoscale: false,
            ..spec
        };
        let priors = ResolvedPriors::resolve(&fixed, &layout, &x, &y).unwrap();
        assert!(priors.scales.iter().all(|s| *s == 2.5));
        assert_eq!(priors.sigma_rate, 1.0);
    }

    #[test]
    fn test_outcome_spread_falls_back_to_one() {
        assert!((outcome_spread(&[1.0, 3.0]) - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(outcome_spread(&[4.0, 4.0, 4.0]), 1.0);
        assert_eq!(outcome_spread(&[4.0]), 1.0);
    }
}
