//! End-to-end fits on synthetic delay data.
//!
//! The data has a known mode effect (Bus 12, Subway 9, Streetcar 16 minutes)
//! and Gaussian noise with sd 3; hour and day have no effect.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

use delay_bayes::{
    delay_by_hour, diagnose, fit, goodness_of_fit, predict, summarize, CovariateRow, DayOfWeek,
    DelayDataset, DelayEvent, FittedModel, ModelError, ModelSpec, Schema, SamplerConfig,
    TimeOfDay,
};

const MODES: [(&str, f64); 3] = [("Bus", 12.0), ("Subway", 9.0), ("Streetcar", 16.0)];

fn synthetic(n: usize, seed: u64) -> DelayDataset {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let events = (0..n)
        .map(|i| {
            let (mode, mean) = MODES[i % MODES.len()];
            let noise: f64 = rng.sample(StandardNormal);
            let hour = rng.random_range(7..13u8);
            let day = DayOfWeek::ALL[rng.random_range(0..7usize)];
            DelayEvent::new(
                mean + 3.0 * noise,
                mode,
                TimeOfDay::new(hour, rng.random_range(0..60u8), 0).unwrap(),
                day,
            )
        })
        .collect();
    DelayDataset::new(events)
}

fn summary_mean(fitted: &FittedModel, name: &str) -> f64 {
    summarize(fitted)
        .into_iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no parameter {}", name))
        .mean
}

// =============================================================================
// RECOVERY
// =============================================================================

#[test]
fn recovers_mode_offsets_and_converges() {
    let dataset = synthetic(300, 11);
    let spec = ModelSpec::transit_delay(&dataset.schema()).unwrap();
    let config = SamplerConfig::default().seed(2024);

    let fitted = fit(&dataset, &spec, &config).unwrap();
    assert_eq!(fitted.draws().n_chains(), 4);
    assert_eq!(fitted.draws().total_draws(), 4_000);

    // Levels sort Bus < Streetcar < Subway, so Bus is the reference
    let streetcar = summary_mean(&fitted, "mode[Streetcar]");
    let subway = summary_mean(&fitted, "mode[Subway]");
    assert!((streetcar - 4.0).abs() < 1.5, "Streetcar offset {}", streetcar);
    assert!((subway + 3.0).abs() < 1.5, "Subway offset {}", subway);

    let sigma = summary_mean(&fitted, "sigma");
    assert!((sigma - 3.0).abs() < 0.6, "sigma {}", sigma);

    let diagnostics = diagnose(&fitted);
    assert!(
        diagnostics.rhat.values().all(|&r| r <= 1.1),
        "R-hat above 1.1: {:?}",
        diagnostics.flagged
    );
    assert!(diagnostics.is_converged());
    assert!(diagnostics.min_ess() > 100.0);

    let gof = goodness_of_fit(&fitted, &dataset).unwrap();
    assert!(gof.in_sample);
    assert!(gof.r2 <= 1.0 && gof.r2 > 0.3, "R2 {}", gof.r2);
    assert!(gof.rmse > 2.0 && gof.rmse < 4.0, "RMSE {}", gof.rmse);
}

#[test]
fn hourly_predictions_follow_mode_means() {
    let dataset = synthetic(300, 12);
    let spec = ModelSpec::transit_delay(&dataset.schema()).unwrap();
    let fitted = fit(&dataset, &spec, &SamplerConfig::quick()).unwrap();

    let hourly = delay_by_hour(&fitted, &["Bus", "Subway", "Streetcar"]).unwrap();
    assert_eq!(hourly.len(), 3 * 6);
    for row in &hourly {
        let truth = MODES.iter().find(|(m, _)| *m == row.mode).unwrap().1;
        assert!(
            (row.predicted - truth).abs() < 3.5,
            "{} at {:02}: {}",
            row.mode,
            row.hour,
            row.predicted
        );
    }
}

#[test]
fn predict_matches_coefficient_means() {
    let dataset = synthetic(120, 13);
    let spec = ModelSpec::transit_delay(&dataset.schema()).unwrap();
    let fitted = fit(&dataset, &spec, &SamplerConfig::quick()).unwrap();

    let event = &dataset.events()[0];
    let x = fitted.layout().encode(event).unwrap();
    let expected: f64 = x
        .iter()
        .zip(fitted.coefficient_means())
        .map(|(a, b)| a * b)
        .sum();

    let predicted = predict(&fitted, &[event.covariates()]).unwrap()[0];
    assert!((predicted - expected).abs() < 1e-9);
}

// =============================================================================
// REPRODUCIBILITY
// =============================================================================

#[test]
fn seeded_fits_are_identical() {
    let dataset = synthetic(90, 14);
    let spec = ModelSpec::transit_delay(&dataset.schema()).unwrap();
    let config = SamplerConfig::quick().seed(99);

    let a = fit(&dataset, &spec, &config).unwrap();
    let b = fit(&dataset, &spec, &config).unwrap();
    assert_eq!(a.draws(), b.draws());
    assert_eq!(summarize(&a), summarize(&b));

    // Parallel and sequential runs share per-chain streams
    let c = fit(&dataset, &spec, &config.clone().parallel(false)).unwrap();
    assert_eq!(a.draws(), c.draws());

    let d = fit(&dataset, &spec, &config.seed(100)).unwrap();
    assert_ne!(a.draws(), d.draws());
}

// =============================================================================
// FAILURES
// =============================================================================

#[test]
fn empty_dataset_fails() {
    let dataset = DelayDataset::new(Vec::new());
    let spec = ModelSpec::transit_delay(&Schema::delay_events()).unwrap();
    let err = fit(&dataset, &spec, &SamplerConfig::quick()).unwrap_err();
    assert!(matches!(err, ModelError::FitFailed { .. }), "{}", err);
}

#[test]
fn invalid_spec_fails_before_sampling() {
    let dataset = synthetic(30, 15);
    let mut spec = ModelSpec::transit_delay(&dataset.schema()).unwrap();
    spec.outcome = "route".to_string();
    let err = fit(&dataset, &spec, &SamplerConfig::quick()).unwrap_err();
    assert!(matches!(err, ModelError::InvalidSpec { .. }), "{}", err);
}

#[test]
fn non_finite_outcome_fails() {
    let mut events = synthetic(30, 16).events().to_vec();
    events[3].duration = f64::NAN;
    let dataset = DelayDataset::new(events);
    let spec = ModelSpec::transit_delay(&dataset.schema()).unwrap();
    let err = fit(&dataset, &spec, &SamplerConfig::quick()).unwrap_err();
    assert!(matches!(err, ModelError::FitFailed { .. }), "{}", err);
}

#[test]
fn too_few_rows_for_design_fails() {
    // Three rows cannot identify intercept + mode + time + day
    let dataset = DelayDataset::new(vec![
        DelayEvent::new(10.0, "Bus", TimeOfDay::at_hour(7).unwrap(), DayOfWeek::Monday),
        DelayEvent::new(8.0, "Subway", TimeOfDay::at_hour(8).unwrap(), DayOfWeek::Tuesday),
        DelayEvent::new(15.0, "Streetcar", TimeOfDay::at_hour(9).unwrap(), DayOfWeek::Friday),
    ]);
    let spec = ModelSpec::transit_delay(&dataset.schema()).unwrap();
    let err = fit(&dataset, &spec, &SamplerConfig::quick()).unwrap_err();
    assert!(matches!(err, ModelError::FitFailed { .. }), "{}", err);
}

#[test]
fn exhausted_budget_times_out() {
    let dataset = synthetic(300, 18);
    let spec = ModelSpec::transit_delay(&dataset.schema()).unwrap();
    let config = SamplerConfig::thorough().time_budget(Duration::from_nanos(1));
    let err = fit(&dataset, &spec, &config).unwrap_err();
    assert!(matches!(err, ModelError::FitTimeout { .. }), "{}", err);
}

#[test]
fn unknown_level_is_rejected_at_prediction() {
    let dataset = synthetic(60, 19);
    let spec = ModelSpec::transit_delay(&dataset.schema()).unwrap();
    let fitted = fit(&dataset, &spec, &SamplerConfig::quick()).unwrap();

    let row = CovariateRow::new("Ferry", TimeOfDay::at_hour(8).unwrap(), DayOfWeek::Friday);
    let err = predict(&fitted, &[row]).unwrap_err();
    assert!(matches!(err, ModelError::UnknownLevel { .. }), "{}", err);

    // Hour 03 was never observed
    let row = CovariateRow::new("Bus", TimeOfDay::at_hour(3).unwrap(), DayOfWeek::Friday);
    assert!(predict(&fitted, &[row]).is_err());
}
