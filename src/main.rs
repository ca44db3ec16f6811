//! delay-bayes CLI: fit the transit-delay model and report on it.
//!
//! # Usage
//!
//! ```bash
//! # Fit on a 0.1% sample and save the artifact
//! delay-bayes fit --data delays.csv --output model.json \
//!   --subsample 0.001 --subsample-seed 2024
//!
//! # Print summary, R-hat and hourly predictions; write JSON tables
//! delay-bayes report --model model.json --data delays.csv --json report.json
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use delay_bayes::output::{format_report, to_json_pretty};
use delay_bayes::{
    diagnose, fit, load_delay_csv, FittedModel, ModelSpec, Report, SamplerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "delay-bayes")]
#[command(about = "Bayesian regression of transit delay durations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fit the model to a delay CSV and save the fitted artifact
    Fit {
        /// Delay CSV with duration, mode, time and day columns
        #[arg(short, long)]
        data: PathBuf,

        /// Where to write the fitted-model JSON artifact
        #[arg(short, long)]
        output: PathBuf,

        /// Number of chains
        #[arg(long)]
        chains: Option<usize>,

        /// Warm-up iterations per chain (discarded)
        #[arg(long)]
        warmup: Option<usize>,

        /// Retained iterations per chain
        #[arg(long)]
        iterations: Option<usize>,

        /// Base seed for the chain streams (also read from DELAY_BAYES_SEED)
        #[arg(long)]
        seed: Option<u64>,

        /// Keep this fraction of rows before fitting (requires --subsample-seed)
        #[arg(long)]
        subsample: Option<f64>,

        /// Seed for --subsample
        #[arg(long)]
        subsample_seed: Option<u64>,

        /// Wall-clock budget for the whole fit, in seconds
        #[arg(long)]
        time_budget_secs: Option<u64>,

        /// Use the declared prior scales verbatim instead of scaling by the data
        #[arg(long)]
        no_autoscale: bool,

        /// Run chains one after another instead of in parallel
        #[arg(long)]
        sequential: bool,
    },

    /// Print summary, diagnostics and hourly predictions for a fitted model
    Report {
        /// Fitted-model JSON artifact written by `fit`
        #[arg(short, long)]
        model: PathBuf,

        /// Training CSV, to add in-sample goodness of fit
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Also write the report tables as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Include per-chain traces in the JSON output
        #[arg(long)]
        include_trace: bool,
    },
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fit {
            data,
            output,
            chains,
            warmup,
            iterations,
            seed,
            subsample,
            subsample_seed,
            time_budget_secs,
            no_autoscale,
            sequential,
        } => {
            let mut dataset = load_delay_csv(&data)
                .with_context(|| format!("loading {}", data.display()))?;
            tracing::info!("loaded {} delay events from {}", dataset.len(), data.display());

            match (subsample, subsample_seed) {
                (Some(fraction), Some(seed)) => {
                    if !(fraction > 0.0 && fraction <= 1.0) {
                        bail!("--subsample must be in (0, 1], got {}", fraction);
                    }
                    dataset = dataset.subsample(fraction, seed);
                    tracing::info!(
                        "subsampled to {} events ({}%, seed {})",
                        dataset.len(),
                        fraction * 100.0,
                        seed
                    );
                }
                (Some(_), None) => bail!("--subsample requires --subsample-seed"),
                (None, Some(_)) => bail!("--subsample-seed has no effect without --subsample"),
                (None, None) => {}
            }

            let mut spec = ModelSpec::transit_delay(&dataset.schema())?;
            spec.autoscale = !no_autoscale;

            let mut config = SamplerConfig::default().with_env_overrides();
            if let Some(chains) = chains {
                config.chains = chains;
            }
            if let Some(warmup) = warmup {
                config.warmup = warmup;
            }
            if let Some(iterations) = iterations {
                config.iterations = iterations;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(secs) = time_budget_secs {
                config.time_budget = std::time::Duration::from_secs(secs);
            }
            config.parallel = !sequential;

            let fitted = fit(&dataset, &spec, &config)?;
            // Warnings are logged by diagnose
            let diagnostics = diagnose(&fitted);
            fitted.save(&output)?;
            println!(
                "Saved {} ({} parameters, max R-hat {:.3})",
                output.display(),
                fitted.parameter_names().len(),
                diagnostics.max_rhat()
            );
        }

        Commands::Report {
            model,
            data,
            json,
            include_trace,
        } => {
            let fitted = FittedModel::load(&model)?;
            let dataset = data
                .as_ref()
                .map(|path| {
                    load_delay_csv(path).with_context(|| format!("loading {}", path.display()))
                })
                .transpose()?;

            let report = Report::build(&fitted, dataset.as_ref(), include_trace)?;
            print!("{}", format_report(&report));

            if let Some(path) = json {
                let body = to_json_pretty(&report).context("serializing report")?;
                fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
                tracing::info!("wrote report tables to {}", path.display());
            }
        }
    }

    Ok(())
}
