//! Time strings, CSV tables and per-sample action flags.
//!
//! Time strings such as `"01:02.5"` are converted to seconds with chrono
//! format strings; formats without an hour field are accepted and count from
//! zero hours. A [`Table`] keeps CSV cells as text so arbitrary columns can be
//! converted in place.
//!
//! # Example
//! ```rust
//! use datakit::timestamps::{timestring_to_seconds, DEFAULT_TIME_FORMAT};
//!
//! let s = timestring_to_seconds("01:02.5", DEFAULT_TIME_FORMAT).unwrap();
//! assert!((s - 62.5).abs() < 1e-9);
//! ```

use std::io::{Read, Write};
use std::path::Path;

use chrono::{NaiveTime, Timelike};
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minutes, seconds and an optional fraction.
pub const DEFAULT_TIME_FORMAT: &str = "%M:%S%.f";

/// Errors that can occur while handling time tables.
#[derive(Error, Debug)]
pub enum TimeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cannot parse {value:?} with format {format:?}: {source}")]
    Parse {
        value: String,
        format: String,
        source: chrono::ParseError,
    },

    #[error("cannot parse {value:?} in column {column:?} as a number")]
    NotANumber { column: String, value: String },

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },
}

/// Result type for time table operations.
pub type Result<T> = std::result::Result<T, TimeError>;

/// Whether `format` contains an hour specifier, with or without a padding
/// flag (`%H`, `%-I`, `%_k`, `%T`, ...). `%%` is a literal percent sign.
fn has_hour_field(format: &str) -> bool {
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        let mut spec = chars.next();
        if matches!(spec, Some('-' | '_' | '0')) {
            spec = chars.next();
        }
        if matches!(spec, Some('H' | 'k' | 'I' | 'l' | 'T' | 'R' | 'X' | 'r')) {
            return true;
        }
    }
    false
}

/// Parse `value` with `format` and return the time of day in seconds.
///
/// # Errors
/// [`TimeError::Parse`] when the string does not match the format.
pub fn timestring_to_seconds(value: &str, format: &str) -> Result<f64> {
    let parsed = if has_hour_field(format) {
        NaiveTime::parse_from_str(value.trim(), format)
    } else {
        NaiveTime::parse_from_str(&format!("0:{}", value.trim()), &format!("%H:{format}"))
    };
    let time = parsed.map_err(|source| TimeError::Parse {
        value: value.to_string(),
        format: format.to_string(),
        source,
    })?;
    Ok(f64::from(time.num_seconds_from_midnight()) + f64::from(time.nanosecond()) / 1e9)
}

/// CSV contents as text cells.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column names.
    pub headers: Vec<String>,
    /// Cells, one `Vec` per row with one cell per header.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Read a CSV file with a header row.
    ///
    /// # Errors
    /// [`TimeError::Io`]/[`TimeError::Csv`] on read failure,
    /// [`TimeError::RaggedRow`] when a row length differs from the header.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let table = Self::from_reader(file)?;
        debug!(
            "read {} rows x {} columns from {}",
            table.rows.len(),
            table.headers.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    /// Read CSV with a header row from any reader.
    ///
    /// # Errors
    /// See [`Table::read`].
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(TimeError::RaggedRow {
                    row,
                    got: record.len(),
                    expected: headers.len(),
                });
            }
            rows.push(record.iter().map(String::from).collect());
        }
        Ok(Self { headers, rows })
    }

    /// Write as CSV with a header row.
    ///
    /// # Errors
    /// [`TimeError::Csv`] on write failure.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.headers)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write to a CSV file.
    ///
    /// # Errors
    /// See [`Table::write_to`].
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_to(std::fs::File::create(path)?)
    }

    /// Index of the column called `name`.
    ///
    /// # Errors
    /// [`TimeError::MissingColumn`] if there is none.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| TimeError::MissingColumn(name.to_string()))
    }

    /// Values of column `name` parsed as numbers.
    ///
    /// # Errors
    /// [`TimeError::MissingColumn`], or [`TimeError::NotANumber`] for the
    /// first cell that does not parse.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.column(name)?;
        self.rows
            .iter()
            .map(|row| {
                row[idx].parse().map_err(|_| TimeError::NotANumber {
                    column: name.to_string(),
                    value: row[idx].clone(),
                })
            })
            .collect()
    }

    /// Replace the time strings of every column in `columns` with seconds.
    ///
    /// # Errors
    /// [`TimeError::MissingColumn`] for unknown columns, [`TimeError::Parse`]
    /// for cells that do not match `format`. The table is left untouched on
    /// error.
    pub fn convert_time_columns(&mut self, columns: &[&str], format: &str) -> Result<()> {
        let indices = columns
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<usize>>>()?;
        let mut converted = self.rows.clone();
        for row in &mut converted {
            for &idx in &indices {
                row[idx] = timestring_to_seconds(&row[idx], format)?.to_string();
            }
        }
        self.rows = converted;
        Ok(())
    }
}

/// Names of the action table columns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionColumns {
    /// Action name column.
    pub action: String,
    /// Start time column, in seconds.
    pub start: String,
    /// End time column, in seconds.
    pub end: String,
}

impl Default for ActionColumns {
    fn default() -> Self {
        Self {
            action: "action".to_string(),
            start: "start_time".to_string(),
            end: "end_time".to_string(),
        }
    }
}

/// An action active from `start` to `end` seconds, both inclusive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionSpan {
    /// Action name.
    pub action: String,
    /// First covered time.
    pub start: f64,
    /// Last covered time.
    pub end: f64,
}

impl ActionSpan {
    /// Whether `time` lies in `start..=end`.
    #[must_use]
    pub fn covers(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Read action spans from a table.
///
/// # Errors
/// [`TimeError::MissingColumn`] or [`TimeError::NotANumber`].
pub fn action_spans(table: &Table, columns: &ActionColumns) -> Result<Vec<ActionSpan>> {
    let action = table.column(&columns.action)?;
    let starts = table.numeric_column(&columns.start)?;
    let ends = table.numeric_column(&columns.end)?;
    Ok(table
        .rows
        .iter()
        .zip(starts.into_iter().zip(ends))
        .map(|(row, (start, end))| ActionSpan {
            action: row[action].clone(),
            start,
            end,
        })
        .collect())
}

/// 0/1 activity of every action at every time sample.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionIndicators {
    /// Sample times, one per flag row.
    pub times: Vec<f64>,
    /// Distinct actions in order of first appearance.
    pub actions: Vec<String>,
    /// Shape `(times.len(), actions.len())`.
    pub flags: Array2<u8>,
}

impl ActionIndicators {
    /// Flags of one action, if known.
    #[must_use]
    pub fn column(&self, action: &str) -> Option<Vec<u8>> {
        let idx = self.actions.iter().position(|a| a == action)?;
        Some(self.flags.column(idx).to_vec())
    }

    /// Table with the time column followed by one column per action.
    #[must_use]
    pub fn to_table(&self, time_column: &str) -> Table {
        let mut headers = vec![time_column.to_string()];
        headers.extend(self.actions.iter().cloned());
        let rows = self
            .times
            .iter()
            .zip(self.flags.outer_iter())
            .map(|(t, flags)| {
                std::iter::once(t.to_string())
                    .chain(flags.iter().map(u8::to_string))
                    .collect()
            })
            .collect();
        Table { headers, rows }
    }
}

/// Mark, for every time sample, which actions have a span covering it.
#[must_use]
pub fn action_indicators(times: &[f64], spans: &[ActionSpan]) -> ActionIndicators {
    let mut actions: Vec<String> = Vec::new();
    for span in spans {
        if !actions.contains(&span.action) {
            actions.push(span.action.clone());
        }
    }
    let mut flags = Array2::<u8>::zeros((times.len(), actions.len()));
    for span in spans {
        let Some(col) = actions.iter().position(|a| *a == span.action) else {
            continue;
        };
        for (row, &t) in times.iter().enumerate() {
            if span.covers(t) {
                flags[[row, col]] = 1;
            }
        }
    }
    ActionIndicators {
        times: times.to_vec(),
        actions,
        flags,
    }
}
