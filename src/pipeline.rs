//! The value normalization pipeline.
//!
//! Applies the configured map kind to each targeted (sheet, column) pair and
//! produces a new set of dataset snapshots; inputs are never mutated. The
//! execution order is fixed and load-bearing: integer and derived-value fixes
//! run before text and location normalization, so the manual-vs-auto diff
//! measures exactly what this pipeline changed and nothing about ordering
//! ambiguity.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result, anyhow};
use chrono::Duration;
use log::info;

use crate::{
    config::CleanConfig,
    corrections::{self, CorrectionMap},
    data::{Cell, Dataset, Value, parse_naive_datetime},
    locations::{self, Level},
    speller::{SpellCorrector, normalize_sample},
};

/// Largest legitimate integer code; values outside 0..=MAX pass through
/// unchanged rather than being coerced.
const MAX_INTEGER_CODE: i64 = 99;

pub struct Pipeline<'a> {
    config: &'a CleanConfig,
    maps_dir: &'a Path,
    corrector: &'a SpellCorrector,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a CleanConfig, maps_dir: &'a Path, corrector: &'a SpellCorrector) -> Self {
        Self {
            config,
            maps_dir,
            corrector,
        }
    }

    /// Runs every configured step in order over all sheets, returning the
    /// cleaned snapshots. A targeted sheet or column that is absent is a
    /// fatal precondition failure, not a silent skip.
    pub fn clean_all(
        &self,
        sheets: &BTreeMap<String, Dataset>,
    ) -> Result<BTreeMap<String, Dataset>> {
        let mut cleaned = sheets.clone();

        for target in &self.config.date_columns {
            self.transform(&mut cleaned, &target.sheet, &target.column, parse_date_cell)
                .with_context(|| format!("Parsing dates in {}.{}", target.sheet, target.column))?;
        }

        for target in &self.config.integer_code_columns {
            self.transform(&mut cleaned, &target.sheet, &target.column, integer_code_cell)
                .with_context(|| {
                    format!("Mapping integer codes in {}.{}", target.sheet, target.column)
                })?;
        }

        for fill in &self.config.derived_fills {
            let dataset = require_sheet(&cleaned, &fill.sheet)?;
            let filled = derived_fill(dataset, &fill.target, &fill.left, &fill.right)
                .with_context(|| format!("Filling {}.{}", fill.sheet, fill.target))?;
            cleaned.insert(fill.sheet.clone(), filled);
        }

        for target in &self.config.duration_columns {
            let hours = &target.hours;
            self.transform(&mut cleaned, &target.sheet, &target.column, |cell| {
                duration_cell(cell, hours)
            })
            .with_context(|| format!("Mapping durations in {}.{}", target.sheet, target.column))?;
        }

        for target in &self.config.ordinal_columns {
            let categories = &target.categories;
            self.transform(&mut cleaned, &target.sheet, &target.column, |cell| {
                ordinal_cell(cell, categories)
            })
            .with_context(|| format!("Mapping categories in {}.{}", target.sheet, target.column))?;
        }

        for entry in &self.config.text_columns {
            for column in self.config.text_columns_for(&entry.sheet).to_vec() {
                let dataset = require_sheet(&cleaned, &entry.sheet)?;
                let map = corrections::load_or_build(
                    self.maps_dir,
                    dataset,
                    &column,
                    self.corrector,
                    self.config.spelling_threshold,
                )
                .with_context(|| format!("Correction map for {}.{column}", entry.sheet))?;
                self.transform(&mut cleaned, &entry.sheet, &column, |cell| {
                    text_cell(cell, &map)
                })?;
            }
        }

        self.apply_location_maps(&mut cleaned)?;

        info!("Cleaned {} sheet(s)", cleaned.len());
        Ok(cleaned)
    }

    fn apply_location_maps(&self, cleaned: &mut BTreeMap<String, Dataset>) -> Result<()> {
        if !locations::maps_exist(self.maps_dir) {
            info!("Constructing default location mappings");
            locations::build_maps(cleaned, &self.config.location_sheets, self.maps_dir)?;
        }
        for level in Level::ALL {
            let map = locations::load_map(self.maps_dir, level)
                .with_context(|| format!("Loading {} map", level.column()))?;
            for sheet in &self.config.location_sheets {
                self.transform(cleaned, sheet, level.column(), |cell| {
                    location_cell(cell, &map)
                })
                .with_context(|| {
                    format!("Canonicalizing {} in sheet '{sheet}'", level.column())
                })?;
            }
        }
        Ok(())
    }

    fn transform<F>(
        &self,
        cleaned: &mut BTreeMap<String, Dataset>,
        sheet: &str,
        column: &str,
        cell_transform: F,
    ) -> Result<()>
    where
        F: Fn(&Cell) -> Cell,
    {
        let dataset = require_sheet(cleaned, sheet)?;
        let col = dataset.require_column(column)?;
        let next = dataset.map_column(col, cell_transform);
        cleaned.insert(sheet.to_string(), next);
        Ok(())
    }
}

fn require_sheet<'a>(sheets: &'a BTreeMap<String, Dataset>, name: &str) -> Result<&'a Dataset> {
    sheets
        .get(name)
        .ok_or_else(|| anyhow!("Targeted sheet '{name}' is not present in the dataset"))
}

fn parse_date_cell(cell: &Cell) -> Cell {
    match cell {
        Some(Value::Text(text)) => match parse_naive_datetime(text.trim()) {
            Ok(dt) => Some(Value::DateTime(dt)),
            Err(_) => cell.clone(),
        },
        other => other.clone(),
    }
}

/// Aliases (letter placeholder, missing marker, empty) collapse to zero;
/// legitimate codes 0..=99 stand; anything else passes through unchanged.
fn integer_code_cell(cell: &Cell) -> Cell {
    match cell {
        None => Some(Value::Integer(0)),
        Some(Value::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty()
                || trimmed.eq_ignore_ascii_case("o")
                || trimmed.eq_ignore_ascii_case("nan")
            {
                return Some(Value::Integer(0));
            }
            match trimmed.parse::<i64>() {
                Ok(code) if (0..=MAX_INTEGER_CODE).contains(&code) => Some(Value::Integer(code)),
                _ => cell.clone(),
            }
        }
        Some(value) => match value.as_integer() {
            Some(code) if (0..=MAX_INTEGER_CODE).contains(&code) => Some(Value::Integer(code)),
            _ => cell.clone(),
        },
    }
}

/// Fills `target` with `left + right` only when the target is missing and
/// both siblings are present; a single sibling never infers anything.
fn derived_fill(dataset: &Dataset, target: &str, left: &str, right: &str) -> Result<Dataset> {
    let target_col = dataset.require_column(target)?;
    let left_col = dataset.require_column(left)?;
    let right_col = dataset.require_column(right)?;

    Ok(dataset.map_rows(|row| {
        let mut row = row.to_vec();
        if row[target_col].is_none()
            && let (Some(a), Some(b)) = (&row[left_col], &row[right_col])
        {
            row[target_col] = match (a.as_integer(), b.as_integer()) {
                (Some(a), Some(b)) => Some(Value::Integer(a + b)),
                _ => match (numeric(a), numeric(b)) {
                    (Some(a), Some(b)) => Some(Value::Float(a + b)),
                    _ => None,
                },
            };
        }
        row
    }))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Duration buckets have no safe identity fallback: a duration cannot default
/// to the original string, so unmapped text becomes missing.
fn duration_cell(cell: &Cell, hours: &BTreeMap<String, i64>) -> Cell {
    let text = cell.as_ref()?.as_display();
    let key = normalize_sample(&text);
    hours
        .get(&key)
        .map(|span| Value::Duration(Duration::hours(*span)))
}

fn ordinal_cell(cell: &Cell, categories: &BTreeMap<String, i64>) -> Cell {
    match cell {
        Some(Value::Text(text)) => {
            let key = normalize_sample(text);
            if key.is_empty() {
                return None;
            }
            match categories.get(&key) {
                Some(ordinal) => Some(Value::Integer(*ordinal)),
                None => Some(Value::Text(key)),
            }
        }
        other => other.clone(),
    }
}

fn text_cell(cell: &Cell, map: &CorrectionMap) -> Cell {
    match cell {
        Some(Value::Text(text)) => {
            let key = normalize_sample(text);
            if key.is_empty() {
                return None;
            }
            Some(Value::Text(map.lookup(&key).to_string()))
        }
        other => other.clone(),
    }
}

fn location_cell(cell: &Cell, map: &CorrectionMap) -> Cell {
    match cell {
        Some(Value::Text(text)) => {
            let key = locations::normalize_location(text);
            if key.is_empty() {
                return None;
            }
            Some(Value::Text(map.lookup(&key).to_string()))
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use tempfile::tempdir;

    fn text(value: &str) -> Cell {
        Some(Value::Text(value.to_string()))
    }

    #[test]
    fn integer_code_scenarios() {
        assert_eq!(integer_code_cell(&text("o")), Some(Value::Integer(0)));
        assert_eq!(integer_code_cell(&text("O")), Some(Value::Integer(0)));
        assert_eq!(integer_code_cell(&text("nan")), Some(Value::Integer(0)));
        assert_eq!(integer_code_cell(&None), Some(Value::Integer(0)));
        assert_eq!(integer_code_cell(&text("47")), Some(Value::Integer(47)));
        assert_eq!(
            integer_code_cell(&Some(Value::Integer(47))),
            Some(Value::Integer(47))
        );
        // Out of the alias set and out of range: passed through unchanged.
        assert_eq!(integer_code_cell(&text("xyz")), text("xyz"));
        assert_eq!(
            integer_code_cell(&Some(Value::Integer(150))),
            Some(Value::Integer(150))
        );
    }

    #[test]
    fn derived_fill_requires_both_siblings() {
        let dataset = Dataset::new(
            "Trigger_Ave",
            vec![
                "Children".to_string(),
                "Male_child".to_string(),
                "Female_child".to_string(),
            ],
            vec![
                vec![None, Some(Value::Integer(3)), Some(Value::Integer(2))],
                vec![None, None, Some(Value::Integer(2))],
                vec![Some(Value::Integer(9)), Some(Value::Integer(1)), Some(Value::Integer(1))],
            ],
        );
        let filled = derived_fill(&dataset, "Children", "Male_child", "Female_child")
            .expect("fill");
        assert_eq!(filled.rows[0][0], Some(Value::Integer(5)));
        assert_eq!(filled.rows[1][0], None);
        // Present totals are never overwritten.
        assert_eq!(filled.rows[2][0], Some(Value::Integer(9)));
    }

    #[test]
    fn duration_mapping_scenarios() {
        let hours = CleanConfig::default().duration_columns[0].hours.clone();
        assert_eq!(
            duration_cell(&text(" 4 Weeks Or More "), &hours),
            Some(Value::Duration(Duration::days(28)))
        );
        assert_eq!(
            duration_cell(&text("2-3 weeks"), &hours),
            Some(Value::Duration(Duration::days(17) + Duration::hours(6)))
        );
        // Unrecognized text becomes missing, never the original string.
        assert_eq!(duration_cell(&text("soon"), &hours), None);
        assert_eq!(duration_cell(&None, &hours), None);
    }

    #[test]
    fn ordinal_mapping_with_identity_fallback() {
        let categories = CleanConfig::default().ordinal_columns[0].categories.clone();
        assert_eq!(
            ordinal_cell(&text(" Very High "), &categories),
            Some(Value::Integer(4))
        );
        assert_eq!(
            ordinal_cell(&text("very hig"), &categories),
            Some(Value::Integer(4))
        );
        assert_eq!(
            ordinal_cell(&text("Unsure"), &categories),
            text("unsure")
        );
    }

    #[test]
    fn clean_all_is_fatal_on_missing_targeted_column() {
        let mut sheets = BTreeMap::new();
        sheets.insert(
            "Follow_Up".to_string(),
            Dataset::new("Follow_Up", vec!["Timestamp".to_string()], vec![]),
        );
        let config = CleanConfig {
            skip_sheets: Vec::new(),
            date_columns: Vec::new(),
            integer_code_columns: vec![crate::config::SheetColumn {
                sheet: "Follow_Up".to_string(),
                column: "Children".to_string(),
            }],
            derived_fills: Vec::new(),
            duration_columns: Vec::new(),
            ordinal_columns: Vec::new(),
            text_columns: Vec::new(),
            location_sheets: Vec::new(),
            ..CleanConfig::default()
        };
        let temp = tempdir().expect("temp dir");
        let corrector = SpellCorrector::from_entries([("water", 10u64)]);
        let pipeline = Pipeline::new(&config, temp.path(), &corrector);
        let err = pipeline.clean_all(&sheets).unwrap_err();
        assert!(err.to_string().contains("Children"), "{err:#}");
    }

    #[test]
    fn clean_all_builds_text_and_location_maps_on_first_use() {
        let temp = tempdir().expect("temp dir");
        let mut sheets = BTreeMap::new();
        sheets.insert(
            "Trigger_Other".to_string(),
            Dataset::new(
                "Trigger_Other",
                vec![
                    "Timestamp".to_string(),
                    "District".to_string(),
                    "Chiefdom".to_string(),
                    "Section".to_string(),
                    "t_q4".to_string(),
                ],
                vec![vec![
                    None,
                    text("Port  Loko"),
                    text("Kaffu Bullom"),
                    text("Mabolleh"),
                    text("Watre from the wel."),
                ]],
            ),
        );
        let config = CleanConfig {
            date_columns: Vec::new(),
            integer_code_columns: Vec::new(),
            derived_fills: Vec::new(),
            duration_columns: Vec::new(),
            ordinal_columns: Vec::new(),
            text_columns: vec![crate::config::TextColumns {
                sheet: "Trigger_Other".to_string(),
                columns: vec!["t_q4".to_string()],
            }],
            location_sheets: vec!["Trigger_Other".to_string()],
            spelling_threshold: 10,
            ..CleanConfig::default()
        };
        let corrector = SpellCorrector::from_entries([
            ("water", 120u64),
            ("from", 300),
            ("the", 500),
            ("well", 90),
        ]);
        let pipeline = Pipeline::new(&config, temp.path(), &corrector);

        let cleaned = pipeline.clean_all(&sheets).expect("clean");
        let sheet = cleaned.get("Trigger_Other").expect("sheet");
        assert_eq!(sheet.rows[0][4], text("water from the well"));
        assert_eq!(sheet.rows[0][1], text("Port Loko"));
        assert!(locations::maps_exist(temp.path()));
        assert!(
            crate::corrections::column_map_path(temp.path(), "Trigger_Other", "t_q4").is_file()
        );

        // Second run loads the persisted maps and is a no-op on the output.
        let again = pipeline.clean_all(&cleaned).expect("idempotent clean");
        assert_eq!(again.get("Trigger_Other"), cleaned.get("Trigger_Other"));
    }
}
