//! Posterior summaries, predictions and goodness of fit.
//!
//! Everything here is a pure function of a [`FittedModel`]: calling it
//! twice yields bit-identical results.

use serde::{Deserialize, Serialize};

use crate::data::{DataError, DelayDataset};
use crate::error::ModelError;
use crate::fitted::FittedModel;
use crate::statistics::{equal_tailed_interval, mean, quantile_sorted, sample_sd, sorted_copy};
use crate::types::{columns, CovariateRow, CovariateSource, DayOfWeek, TimeOfDay};

/// Posterior summary of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    /// Parameter name.
    pub name: String,
    /// Posterior mean.
    pub mean: f64,
    /// Posterior standard deviation (n − 1 denominator).
    pub sd: f64,
    /// Posterior median.
    pub median: f64,
    /// Lower end of the equal-tailed credible interval.
    pub lower: f64,
    /// Upper end of the equal-tailed credible interval.
    pub upper: f64,
    /// Credible level of `[lower, upper]`.
    pub level: f64,
}

/// Summarize every parameter at the fit's credible level.
pub fn summarize(fitted: &FittedModel) -> Vec<ParameterSummary> {
    summarize_with_level(fitted, fitted.metadata().credible_level)
}

/// Summarize every parameter at an explicit credible level.
///
/// Draws of all chains are pooled in chain order.
///
/// # Panics
///
/// Panics if `level` is not in (0, 1).
pub fn summarize_with_level(fitted: &FittedModel, level: f64) -> Vec<ParameterSummary> {
    assert!(
        level > 0.0 && level < 1.0,
        "credible level must be in (0, 1)"
    );
    let draws = fitted.draws();
    draws
        .parameter_names()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let pooled = draws.pooled(idx);
            let sorted = sorted_copy(&pooled);
            let (lower, upper) = equal_tailed_interval(&sorted, level);
            ParameterSummary {
                name: name.clone(),
                mean: mean(&pooled),
                sd: sample_sd(&pooled),
                median: quantile_sorted(&sorted, 0.5),
                lower,
                upper,
                level,
            }
        })
        .collect()
}

/// Posterior-mean linear predictor for each covariate row.
///
/// # Errors
/// `UnknownLevel` if a row carries a level not seen at fit time.
pub fn predict<S: CovariateSource>(fitted: &FittedModel, rows: &[S]) -> Result<Vec<f64>, ModelError> {
    let beta = fitted.coefficient_means();
    rows.iter()
        .map(|row| {
            let x = fitted.layout().encode(row)?;
            Ok(dot(&x, &beta))
        })
        .collect()
}

/// Credible interval of the linear predictor for one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInterval {
    /// Posterior mean of the linear predictor.
    pub mean: f64,
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
    /// Credible level.
    pub level: f64,
}

/// Posterior credible interval of the linear predictor (the expected delay,
/// not a new observation) for each row, at the fit's credible level.
pub fn predict_interval<S: CovariateSource>(
    fitted: &FittedModel,
    rows: &[S],
) -> Result<Vec<PredictionInterval>, ModelError> {
    let level = fitted.metadata().credible_level;
    let p = fitted.layout().n_coefficients();
    rows.iter()
        .map(|row| {
            let x = fitted.layout().encode(row)?;
            let values: Vec<f64> = fitted
                .draws()
                .iter_draws()
                .map(|draw| dot(&x, &draw[..p]))
                .collect();
            let sorted = sorted_copy(&values);
            let (lower, upper) = equal_tailed_interval(&sorted, level);
            Ok(PredictionInterval {
                mean: mean(&values),
                lower,
                upper,
                level,
            })
        })
        .collect()
}

/// In-sample fit statistics.
///
/// These are computed on the training data: there is no held-out split, so
/// they measure fit rather than predictive accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoodnessOfFit {
    /// Coefficient of determination, `1 - SS_res/SS_tot`.
    pub r2: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Rows evaluated.
    pub n: usize,
    /// Always true: statistics are computed on the fitting data.
    pub in_sample: bool,
}

/// R² and RMSE of posterior-mean predictions against observed durations.
///
/// # Errors
/// `Data(Empty)` for an empty dataset; `UnknownLevel` if the dataset is not
/// the one the model was fitted on and carries new levels.
pub fn goodness_of_fit(
    fitted: &FittedModel,
    dataset: &DelayDataset,
) -> Result<GoodnessOfFit, ModelError> {
    if dataset.is_empty() {
        return Err(DataError::Empty.into());
    }
    let predicted = predict(fitted, dataset.events())?;
    Ok(fit_statistics(&dataset.durations(), &predicted))
}

/// R² and RMSE of `predicted` against `observed`.
///
/// When every observation is equal (SS_tot = 0), R² is 1 for a perfect fit
/// and 0 otherwise.
pub fn fit_statistics(observed: &[f64], predicted: &[f64]) -> GoodnessOfFit {
    debug_assert_eq!(observed.len(), predicted.len());
    let n = observed.len();
    let y_bar = mean(observed);

    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(y, y_hat)| (y - y_hat) * (y - y_hat))
        .sum();
    let ss_tot: f64 = observed.iter().map(|y| (y - y_bar) * (y - y_bar)).sum();

    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    GoodnessOfFit {
        r2,
        rmse: (ss_res / n as f64).sqrt(),
        n,
        in_sample: true,
    }
}

/// Predicted average delay of one mode in one hour bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPrediction {
    /// Transit mode.
    pub mode: String,
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Posterior-mean delay averaged uniformly over days of the week.
    pub predicted: f64,
}

/// Predicted delay per mode and hour, averaged over the training days.
///
/// Hours are the hour buckets seen in training when time is categorical,
/// every hour 0-23 otherwise. Days are the training day levels, or Monday
/// alone when the model has no day term.
///
/// # Errors
/// `UnknownLevel` for a mode not seen at fit time.
pub fn delay_by_hour<M: AsRef<str>>(
    fitted: &FittedModel,
    modes: &[M],
) -> Result<Vec<HourlyPrediction>, ModelError> {
    let layout = fitted.layout();
    let hours: Vec<u8> = match layout.levels(columns::TIME) {
        Some(levels) => levels
            .iter()
            .map(|l| {
                l.parse::<u8>().map_err(|_| {
                    ModelError::invalid_spec(format!("time level '{}' is not an hour", l))
                })
            })
            .collect::<Result<_, _>>()?,
        None => (0..24).collect(),
    };
    let days: Vec<DayOfWeek> = match layout.levels(columns::DAY) {
        Some(levels) => levels
            .iter()
            .map(|l| {
                l.parse::<DayOfWeek>()
                    .map_err(|_| ModelError::invalid_spec(format!("'{}' is not a weekday", l)))
            })
            .collect::<Result<_, _>>()?,
        None => vec![DayOfWeek::Monday],
    };

    let mode_known = |mode: &str| match layout.levels(columns::MODE) {
        Some(levels) => levels.iter().any(|l| l == mode),
        None => true,
    };

    let mut out = Vec::with_capacity(modes.len() * hours.len());
    for mode in modes {
        let mode = mode.as_ref();
        if !mode_known(mode) {
            return Err(ModelError::UnknownLevel {
                term: columns::MODE.to_string(),
                level: mode.to_string(),
            });
        }
        for &hour in &hours {
            let time = TimeOfDay::at_hour(hour).ok_or_else(|| {
                ModelError::invalid_spec(format!("hour {} is out of range", hour))
            })?;
            let rows: Vec<CovariateRow> = days
                .iter()
                .map(|&day| CovariateRow::new(mode, time, day))
                .collect();
            let predicted = mean(&predict(fitted, &rows)?);
            out.push(HourlyPrediction {
                mode: mode.to_string(),
                hour,
                predicted,
            });
        }
    }
    Ok(out)
}

fn dot(x: &[f64], beta: &[f64]) -> f64 {
    x.iter().zip(beta).map(|(a, b)| a * b).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitted::fixtures::{exact_model, fitted, training};

    #[test]
    fn test_summarize_is_deterministic() {
        let model = exact_model();
        let a = summarize(&model);
        let b = summarize(&model);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        assert_eq!(a[0].name, "(Intercept)");
        assert_eq!(a[0].mean, 10.0);
        assert_eq!(a[0].median, 10.0);
        assert!((a[0].sd - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!(a[0].lower < a[0].upper);
        assert_eq!(a[4].name, "sigma");
    }

    #[test]
    fn test_predict_matches_hand_computed() {
        let model = exact_model();
        let rows = [
            CovariateRow::new("Subway", TimeOfDay::at_hour(8).unwrap(), DayOfWeek::Tuesday),
            CovariateRow::new("Bus", TimeOfDay::at_hour(7).unwrap(), DayOfWeek::Monday),
        ];
        let predicted = predict(&model, &rows).unwrap();
        assert_eq!(predicted, vec![10.0 - 3.0 + 2.0, 10.0]);
    }

    #[test]
    fn test_predict_unknown_level() {
        let model = exact_model();
        let rows = [CovariateRow::new(
            "Ferry",
            TimeOfDay::at_hour(7).unwrap(),
            DayOfWeek::Monday,
        )];
        assert!(matches!(
            predict(&model, &rows),
            Err(ModelError::UnknownLevel { .. })
        ));
    }

    #[test]
    fn test_exact_fit_statistics() {
        let model = exact_model();
        let data = DelayDataset::new(training());
        let gof = goodness_of_fit(&model, &data).unwrap();
        assert_eq!(gof.n, 4);
        assert!(gof.in_sample);
        assert!((gof.r2 - 1.0).abs() < 1e-12);
        assert!(gof.rmse.abs() < 1e-12);
    }

    #[test]
    fn test_fit_statistics_bounds() {
        let gof = fit_statistics(&[1.0, 2.0, 3.0], &[3.0, 1.0, 2.0]);
        assert!(gof.r2 <= 1.0);
        assert!(gof.rmse > 0.0);

        assert_eq!(fit_statistics(&[4.0, 4.0], &[4.0, 4.0]).r2, 1.0);
        assert_eq!(fit_statistics(&[4.0, 4.0], &[3.0, 5.0]).r2, 0.0);
    }

    #[test]
    fn test_prediction_interval_brackets_mean() {
        let model = exact_model();
        let rows = [CovariateRow::new(
            "Bus",
            TimeOfDay::at_hour(8).unwrap(),
            DayOfWeek::Monday,
        )];
        let interval = &predict_interval(&model, &rows).unwrap()[0];
        assert_eq!(interval.mean, 12.0);
        assert!(interval.lower < interval.mean && interval.mean < interval.upper);
        assert_eq!(interval.level, 0.95);
    }

    #[test]
    fn test_delay_by_hour() {
        let model = fitted(vec![vec![10.0, -3.0, 2.0, 1.0, 1.0]]);
        let hourly = delay_by_hour(&model, &["Bus", "Subway"]).unwrap();
        assert_eq!(hourly.len(), 4);
        // Average over Monday (0) and Tuesday (+1)
        assert_eq!(hourly[0].mode, "Bus");
        assert_eq!(hourly[0].hour, 7);
        assert!((hourly[0].predicted - 10.5).abs() < 1e-12);
        assert!((hourly[3].predicted - (10.0 - 3.0 + 2.0 + 0.5)).abs() < 1e-12);

        assert!(delay_by_hour(&model, &["Ferry"]).is_err());
    }
}
