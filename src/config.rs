//! Pipeline configuration: which (sheet, column) pairs get which kind of
//! normalization. One parameterized description replaces the hand-maintained
//! near-duplicate cleaning variants that used to drift apart; the default
//! configuration is the complete production pipeline, and a YAML file can
//! override any of it.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::speller::DEFAULT_THRESHOLD;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanConfig {
    /// Sheets excluded from cleaning and diffing (codebooks, digital twins).
    pub skip_sheets: Vec<String>,
    /// Fuzzy-correction acceptance threshold used when building text maps.
    pub spelling_threshold: u64,
    /// Columns re-parsed as datetimes before any mapping runs.
    pub date_columns: Vec<SheetColumn>,
    /// Integer-code columns: aliases collapse to 0, codes 0-99 stand.
    pub integer_code_columns: Vec<SheetColumn>,
    /// Missing totals filled as the sum of two sibling counts.
    pub derived_fills: Vec<DerivedFill>,
    /// Free-text duration buckets mapped to day/hour spans.
    pub duration_columns: Vec<DurationColumn>,
    /// Enumerated text columns mapped to integer categories.
    pub ordinal_columns: Vec<OrdinalColumn>,
    /// Free-text columns normalized through fuzzy correction maps.
    pub text_columns: Vec<TextColumns>,
    /// Sheets whose District/Chiefdom/Section columns share the level maps.
    pub location_sheets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetColumn {
    pub sheet: String,
    pub column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedFill {
    pub sheet: String,
    pub target: String,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationColumn {
    pub sheet: String,
    pub column: String,
    /// Normalized bucket text -> span in hours. No identity fallback:
    /// unmapped text becomes a missing duration.
    pub hours: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinalColumn {
    pub sheet: String,
    pub column: String,
    /// Normalized category text -> ordinal. Unrecognized text keeps its
    /// normalized form (identity fallback).
    pub categories: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextColumns {
    pub sheet: String,
    pub columns: Vec<String>,
}

impl CleanConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Reading pipeline config {path:?}"))?;
        serde_yaml::from_str(&raw).with_context(|| format!("Parsing pipeline config {path:?}"))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Free-text columns targeted on one sheet.
    pub fn text_columns_for(&self, sheet: &str) -> &[String] {
        self.text_columns
            .iter()
            .find(|entry| entry.sheet == sheet)
            .map(|entry| entry.columns.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for CleanConfig {
    fn default() -> Self {
        let sheet_column = |sheet: &str, column: &str| SheetColumn {
            sheet: sheet.to_string(),
            column: column.to_string(),
        };
        let duration_hours: BTreeMap<String, i64> = [
            ("last week", 7 * 24),
            ("2-3 weeks", 17 * 24 + 6),
            ("3weeks", 21 * 24),
            ("4 weeks or more", 28 * 24),
            ("4 weeks 0r m0re", 28 * 24),
            ("5 weeks or more", 35 * 24),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let categories: BTreeMap<String, i64> = [
            ("very low", 0),
            ("low", 1),
            ("medium", 2),
            ("high", 3),
            ("very high", 4),
            ("very hig", 4),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            skip_sheets: vec!["Codebook".to_string(), "digital".to_string()],
            spelling_threshold: DEFAULT_THRESHOLD,
            date_columns: vec![sheet_column("Follow_Up", "Date_of_dep")],
            integer_code_columns: vec![
                sheet_column("Follow_Up", "Children"),
                sheet_column("Follow_Up", "r_mc"),
                sheet_column("Follow_Up", "r_fa"),
            ],
            derived_fills: vec![DerivedFill {
                sheet: "Trigger_Ave".to_string(),
                target: "Children".to_string(),
                left: "Male_child".to_string(),
                right: "Female_child".to_string(),
            }],
            duration_columns: vec![DurationColumn {
                sheet: "Trigger_Other".to_string(),
                column: "t_q1".to_string(),
                hours: duration_hours,
            }],
            ordinal_columns: vec![OrdinalColumn {
                sheet: "Trigger_Other".to_string(),
                column: "t_q5".to_string(),
                categories,
            }],
            text_columns: vec![
                TextColumns {
                    sheet: "Trigger_Other".to_string(),
                    columns: ["t_q4", "t_q6", "t_q7", "t_q8", "t_q9", "t_q10", "t_q11"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                },
                TextColumns {
                    sheet: "Follow_Up_Other".to_string(),
                    columns: ["f_q2", "f_q3", "f_q4", "f_q5", "f_q6"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                },
            ],
            location_sheets: [
                "Follow_Up",
                "Trigger_NA",
                "Trigger_Ave",
                "Trigger_Other",
                "Follow_Up_Other",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}
