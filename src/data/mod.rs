//! Delay datasets and loading them from disk.
//!
//! The loader trusts that upstream cleaning already harmonized mode names
//! and dropped rows with missing values. It only checks that every row
//! parses.
//!
//! # Example
//!
//! ```ignore
//! use delay_bayes::data::load_delay_csv;
//! use std::path::Path;
//!
//! let dataset = load_delay_csv(Path::new("delays.csv"))?;
//! let small = dataset.subsample(0.001, 2024);
//! println!("Loaded {} events, kept {}", dataset.len(), small.len());
//! ```

mod csv;

pub use csv::{load_delay_csv, parse_delay_csv};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::types::{columns, DelayEvent, Schema};

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// IO error reading file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV at a specific line.
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// Line number where the error occurred (1-indexed).
        line: usize,
        /// Description of the parse error.
        message: String,
    },

    /// A required column is missing from the header.
    #[error("Missing column '{expected}'. Found columns: {found:?}")]
    MissingColumn {
        /// Column that was expected.
        expected: String,
        /// Columns that were actually present.
        found: Vec<String>,
    },

    /// A cell could not be parsed into its column's type.
    #[error("Invalid {column} value at line {line}: '{value}'")]
    InvalidValue {
        /// Line number (1-indexed).
        line: usize,
        /// Column the value belongs to.
        column: String,
        /// The offending cell.
        value: String,
    },

    /// The file has a header but no data rows.
    #[error("No delay events found")]
    Empty,
}

/// An in-memory table of delay events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayDataset {
    events: Vec<DelayEvent>,
    /// Optional description of where the events came from.
    pub source: Option<String>,
}

impl DelayDataset {
    /// Create a dataset from events.
    pub fn new(events: Vec<DelayEvent>) -> Self {
        Self {
            events,
            source: None,
        }
    }

    /// Attach a source description.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The events, in load order.
    pub fn events(&self) -> &[DelayEvent] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Column names and kinds the model can reference.
    pub fn schema(&self) -> Schema {
        Schema::delay_events()
    }

    /// Outcome column as a vector.
    pub fn durations(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.duration).collect()
    }

    /// Distinct transit modes, sorted.
    pub fn modes(&self) -> Vec<String> {
        let mut modes: Vec<String> = self.events.iter().map(|e| e.mode.clone()).collect();
        modes.sort();
        modes.dedup();
        modes
    }

    /// Keep each event independently with probability `fraction`.
    ///
    /// The draw is seeded, so the same `(fraction, seed)` always keeps the
    /// same rows. `fraction >= 1` returns a copy; `fraction <= 0` returns an
    /// empty dataset.
    pub fn subsample(&self, fraction: f64, seed: u64) -> DelayDataset {
        if fraction >= 1.0 {
            return self.clone();
        }
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let events = self
            .events
            .iter()
            .filter(|_| rng.random::<f64>() < fraction)
            .cloned()
            .collect();
        let source = self
            .source
            .as_ref()
            .map(|s| format!("{} (subsample {} seed {})", s, fraction, seed));
        DelayDataset { events, source }
    }
}

impl FromIterator<DelayEvent> for DelayDataset {
    fn from_iter<I: IntoIterator<Item = DelayEvent>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Header names accepted for each required column, lower-cased.
pub(crate) fn header_aliases(column: &str) -> &'static [&'static str] {
    match column {
        columns::DURATION => &["duration", "min delay", "min_delay", "delay", "delay_minutes"],
        columns::MODE => &["mode", "transit_mode", "transit mode"],
        columns::TIME => &["time", "time_of_day"],
        columns::DAY => &["day", "day_of_week", "weekday"],
        _ => &[],
    }
}
