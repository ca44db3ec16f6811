//! CSV parsing for delay tables.
//!
//! The header row decides column positions; extra columns are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{header_aliases, DataError, DelayDataset};
use crate::types::{columns, DayOfWeek, DelayEvent, TimeOfDay};

/// Load a delay table from a CSV file.
///
/// Required columns (header names are matched case-insensitively):
/// - duration: `duration`, `Min Delay`, `min_delay`, `delay`
/// - mode: `mode`, `transit_mode`
/// - time: `time` (`HH:MM:SS`)
/// - day: `day`, `day_of_week`
///
/// # Example file content
/// ```csv
/// Date,Time,Day,Mode,Min Delay
/// 2023-01-02,07:45:00,Monday,Bus,12
/// 2023-01-02,08:10:00,Monday,Subway,4
/// ```
///
/// # Errors
/// Returns `DataError` if the file cannot be read, lacks a required column,
/// contains an unparseable cell, or has no data rows.
pub fn load_delay_csv(path: &Path) -> Result<DelayDataset, DataError> {
    let file = File::open(path)?;
    let dataset = parse_delay_csv(BufReader::new(file))?;
    Ok(dataset.with_source(path.to_string_lossy().to_string()))
}

/// Parse a delay table from any buffered reader.
pub fn parse_delay_csv<R: BufRead>(reader: R) -> Result<DelayDataset, DataError> {
    let mut lines = reader.lines().enumerate();

    // First non-empty line is the header
    let header = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break split_row(&line);
                }
            }
            None => return Err(DataError::Empty),
        }
    };
    let positions = ColumnPositions::from_header(&header)?;

    let mut events = Vec::new();
    for (line_num, line_result) in lines {
        let line = line_result?;
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let cells = split_row(line);
        events.push(positions.parse_row(&cells, line_num + 1)?);
    }

    if events.is_empty() {
        return Err(DataError::Empty);
    }
    Ok(DelayDataset::new(events))
}

/// Indices of the required columns within a row.
struct ColumnPositions {
    duration: usize,
    mode: usize,
    time: usize,
    day: usize,
}

impl ColumnPositions {
    fn from_header(header: &[String]) -> Result<Self, DataError> {
        let lowered: Vec<String> = header.iter().map(|h| h.to_ascii_lowercase()).collect();
        let find = |column: &str| {
            header_aliases(column)
                .iter()
                .find_map(|alias| lowered.iter().position(|h| h == *alias))
                .ok_or_else(|| DataError::MissingColumn {
                    expected: column.to_string(),
                    found: header.to_vec(),
                })
        };
        Ok(Self {
            duration: find(columns::DURATION)?,
            mode: find(columns::MODE)?,
            time: find(columns::TIME)?,
            day: find(columns::DAY)?,
        })
    }

    fn parse_row(&self, cells: &[String], line: usize) -> Result<DelayEvent, DataError> {
        let invalid = |column: &str, value: &str| DataError::InvalidValue {
            line,
            column: column.to_string(),
            value: value.to_string(),
        };

        let raw = required_cell(cells, line, self.duration, columns::DURATION)?;
        let duration: f64 = raw.parse().map_err(|_| invalid(columns::DURATION, raw))?;
        if !duration.is_finite() {
            return Err(invalid(columns::DURATION, raw));
        }

        let mode = required_cell(cells, line, self.mode, columns::MODE)?.to_string();

        let raw = required_cell(cells, line, self.time, columns::TIME)?;
        let time: TimeOfDay = raw.parse().map_err(|_| invalid(columns::TIME, raw))?;

        let raw = required_cell(cells, line, self.day, columns::DAY)?;
        let day: DayOfWeek = raw.parse().map_err(|_| invalid(columns::DAY, raw))?;

        Ok(DelayEvent::new(duration, mode, time, day))
    }
}

/// Non-empty cell at `idx`, or a parse error naming the column.
fn required_cell<'a>(
    cells: &'a [String],
    line: usize,
    idx: usize,
    column: &str,
) -> Result<&'a str, DataError> {
    match cells.get(idx).map(String::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(DataError::Parse {
            line,
            message: format!("missing {} value", column),
        }),
    }
}

/// Split a row on commas outside double quotes, trimming whitespace.
///
/// A quoted cell may contain commas; `""` inside quotes is a literal quote.
/// Quoted cells cannot span lines.
fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cell.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                cells.push(cell.trim().to_string());
                cell.clear();
            }
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}
