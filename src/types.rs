//! Domain types: delay events, calendar values and the dataset schema.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Day of the week a delay occurred on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    /// Monday.
    Monday,
    /// Tuesday.
    Tuesday,
    /// Wednesday.
    Wednesday,
    /// Thursday.
    Thursday,
    /// Friday.
    Friday,
    /// Saturday.
    Saturday,
    /// Sunday.
    Sunday,
}

impl DayOfWeek {
    /// All seven days, Monday first.
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Canonical English name.
    pub fn name(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    /// Parse a canonical day name or its three-letter abbreviation,
    /// ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        DayOfWeek::ALL
            .iter()
            .copied()
            .find(|day| {
                let name = day.name().to_ascii_lowercase();
                lower == name || lower == name[..3]
            })
            .ok_or_else(|| format!("unknown day of week '{}'", s.trim()))
    }
}

/// Clock time of a delay event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
    second: u8,
}

impl TimeOfDay {
    /// Create a time of day, or `None` if any field is out of range.
    pub fn new(hour: u8, minute: u8, second: u8) -> Option<Self> {
        (hour < 24 && minute < 60 && second < 60).then_some(Self {
            hour,
            minute,
            second,
        })
    }

    /// Start of the given hour (`HH:00:00`).
    pub fn at_hour(hour: u8) -> Option<Self> {
        Self::new(hour, 0, 0)
    }

    /// Hour of day, 0-23.
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Hour bucket label used as the categorical time level (`"07"`).
    pub fn hour_bucket(&self) -> String {
        format!("{:02}", self.hour)
    }

    /// Time as a fractional hour in `[0, 24)`.
    pub fn fractional_hour(&self) -> f64 {
        self.hour as f64 + self.minute as f64 / 60.0 + self.second as f64 / 3600.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    /// Parse `HH:MM:SS` or `HH:MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(format!("expected HH:MM:SS, got '{}'", trimmed));
        }
        let field = |p: &str| {
            p.parse::<u8>()
                .map_err(|_| format!("invalid time field '{}' in '{}'", p, trimmed))
        };
        let hour = field(parts[0])?;
        let minute = field(parts[1])?;
        let second = match parts.get(2) {
            Some(p) => field(p)?,
            None => 0,
        };
        TimeOfDay::new(hour, minute, second)
            .ok_or_else(|| format!("time out of range: '{}'", trimmed))
    }
}

/// One observed delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayEvent {
    /// Delay duration in minutes.
    pub duration: f64,
    /// Transit mode (e.g. `Bus`, `Subway`, `Streetcar`).
    pub mode: String,
    /// Clock time the delay started.
    pub time: TimeOfDay,
    /// Day of the week.
    pub day: DayOfWeek,
}

impl DelayEvent {
    /// Create a delay event.
    pub fn new(duration: f64, mode: impl Into<String>, time: TimeOfDay, day: DayOfWeek) -> Self {
        Self {
            duration,
            mode: mode.into(),
            time,
            day,
        }
    }

    /// The covariates of this event, without the outcome.
    pub fn covariates(&self) -> CovariateRow {
        CovariateRow {
            mode: self.mode.clone(),
            time: self.time,
            day: self.day,
        }
    }
}

/// Covariate values for prediction: an event without a duration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CovariateRow {
    /// Transit mode.
    pub mode: String,
    /// Clock time.
    pub time: TimeOfDay,
    /// Day of the week.
    pub day: DayOfWeek,
}

impl CovariateRow {
    /// Create a covariate row.
    pub fn new(mode: impl Into<String>, time: TimeOfDay, day: DayOfWeek) -> Self {
        Self {
            mode: mode.into(),
            time,
            day,
        }
    }
}

/// Column names of the delay table.
pub mod columns {
    /// Delay duration in minutes (numeric outcome).
    pub const DURATION: &str = "duration";
    /// Transit mode (categorical).
    pub const MODE: &str = "mode";
    /// Time bucketed to hour of day (categorical).
    pub const TIME: &str = "time";
    /// Fractional hour of day (numeric).
    pub const HOUR: &str = "hour";
    /// Day of week (categorical).
    pub const DAY: &str = "day";
}

/// A single cell read through [`CovariateSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Numeric value.
    Numeric(f64),
    /// Categorical level.
    Level(String),
}

/// Anything that can provide covariate cells by column name.
pub trait CovariateSource {
    /// Value of `column`, or `None` if the column is not known.
    fn cell(&self, column: &str) -> Option<Cell>;
}

impl CovariateSource for CovariateRow {
    fn cell(&self, column: &str) -> Option<Cell> {
        match column {
            columns::MODE => Some(Cell::Level(self.mode.clone())),
            columns::TIME => Some(Cell::Level(self.time.hour_bucket())),
            columns::HOUR => Some(Cell::Numeric(self.time.fractional_hour())),
            columns::DAY => Some(Cell::Level(self.day.name().to_string())),
            _ => None,
        }
    }
}

impl CovariateSource for DelayEvent {
    fn cell(&self, column: &str) -> Option<Cell> {
        match column {
            columns::DURATION => Some(Cell::Numeric(self.duration)),
            columns::MODE => Some(Cell::Level(self.mode.clone())),
            columns::TIME => Some(Cell::Level(self.time.hour_bucket())),
            columns::HOUR => Some(Cell::Numeric(self.time.fractional_hour())),
            columns::DAY => Some(Cell::Level(self.day.name().to_string())),
            _ => None,
        }
    }
}

/// Kind of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Real-valued column.
    Numeric,
    /// Column of string levels.
    Categorical,
}

/// Column names and kinds of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<(String, ColumnKind)>,
}

impl Schema {
    /// Build a schema from `(name, kind)` pairs.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnKind)>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(|(n, k)| (n.into(), k)).collect(),
        }
    }

    /// Schema of a delay table.
    pub fn delay_events() -> Self {
        Self::new([
            (columns::DURATION, ColumnKind::Numeric),
            (columns::MODE, ColumnKind::Categorical),
            (columns::TIME, ColumnKind::Categorical),
            (columns::HOUR, ColumnKind::Numeric),
            (columns::DAY, ColumnKind::Categorical),
        ])
    }

    /// Kind of `name`, if the column exists.
    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, k)| *k)
    }

    /// Column names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }
}
