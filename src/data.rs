use std::fmt;

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;

/// Fatal precondition failures. Anything else in the crate is surfaced as a
/// contextual `anyhow` error; these variants exist so callers can tell a
/// structural violation apart from an I/O mishap.
#[derive(Debug, Error)]
pub enum CleanseError {
    #[error(
        "sheet '{sheet}' versions disagree on shape: {left_rows}x{left_cols} vs {right_rows}x{right_cols}"
    )]
    ShapeMismatch {
        sheet: String,
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },
    #[error("sheet '{sheet}' versions disagree on column order")]
    ColumnOrderMismatch { sheet: String },
    #[error("sheet '{sheet}' has no column '{column}'")]
    MissingColumn { sheet: String, column: String },
    #[error("spelling dictionary '{path}' contains no usable terms")]
    EmptyDictionary { path: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    Duration(Duration),
}

/// A cell is either a typed value or missing. Missing cells compare equal to
/// each other, which the diff engine relies on.
pub type Cell = Option<Value>;

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Duration(d) => format_duration(d),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

fn format_duration(duration: &Duration) -> String {
    let hours = duration.num_hours();
    if hours % 24 == 0 {
        format!("{} days", hours / 24)
    } else {
        format!("{:.2} days", hours as f64 / 24.0)
    }
}

/// One named sheet: a fixed column schema and positionally ordered rows.
/// Normalization steps never mutate a `Dataset` in place; they produce a new
/// snapshot so raw/manual/auto versions stay independent for diffing.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let name = name.into();
        debug_assert!(
            rows.iter().all(|row| row.len() == columns.len()),
            "all rows in '{name}' must match the column schema"
        );
        Self {
            name,
            columns,
            rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn require_column(&self, column: &str) -> Result<usize, CleanseError> {
        self.column_index(column)
            .ok_or_else(|| CleanseError::MissingColumn {
                sheet: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }

    /// Distinct non-missing textual values of one column, sorted so that
    /// downstream map construction is deterministic.
    pub fn distinct_text(&self, col: usize) -> Vec<String> {
        let mut values: Vec<String> = self
            .rows
            .iter()
            .filter_map(|row| row[col].as_ref())
            .filter_map(|value| value.as_text())
            .map(|text| text.to_string())
            .collect();
        values.sort();
        values.dedup();
        values
    }

    /// Returns a new snapshot with `transform` applied to every cell of one
    /// column.
    pub fn map_column<F>(&self, col: usize, transform: F) -> Dataset
    where
        F: Fn(&Cell) -> Cell,
    {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row[col] = transform(&row[col]);
                row
            })
            .collect();
        Dataset::new(self.name.clone(), self.columns.clone(), rows)
    }

    /// Returns a new snapshot with `transform` applied to every row. The
    /// transform sees the whole row, for fills that depend on sibling columns.
    pub fn map_rows<F>(&self, transform: F) -> Dataset
    where
        F: Fn(&[Cell]) -> Vec<Cell>,
    {
        let rows = self.rows.iter().map(|row| transform(row)).collect();
        Dataset::new(self.name.clone(), self.columns.clone(), rows)
    }
}

const MISSING_MARKERS: &[&str] = &["", "nan", "NaN", "NA", "N/A"];

/// Best-effort typing of a raw CSV field: integer, then float, then text.
/// The first column of every sheet is a capture timestamp and is parsed as
/// such; it orders rows but carries no cleaning semantics.
pub fn parse_cell(raw: &str, timestamp: bool) -> Cell {
    let trimmed = raw.trim();
    if MISSING_MARKERS.contains(&trimmed) {
        return None;
    }
    if timestamp && let Ok(dt) = parse_naive_datetime(trimmed) {
        return Some(Value::DateTime(dt));
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Some(Value::Float(f));
    }
    Some(Value::Text(raw.to_string()))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    let mut last_err = None;
    for fmt in DATETIME_FORMATS {
        match NaiveDateTime::parse_from_str(value, fmt) {
            Ok(parsed) => return Ok(parsed),
            Err(err) => last_err = Some(err),
        }
    }
    // Date-only capture timestamps occur in older sheets.
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = chrono::NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed.and_hms_opt(0, 0, 0).expect("midnight is valid"));
        }
    }
    Err(last_err.expect("format list is non-empty"))
}
