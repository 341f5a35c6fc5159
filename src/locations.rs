//! Hierarchical location canonicalization.
//!
//! The same place name appears inconsistently across sheets, so each
//! administrative level (district / chiefdom / section) gets one correction
//! map shared by every sheet carrying that column, not one map per sheet.
//! Maps are identity-seeded from the union of observed values: place names
//! sit outside a general-purpose spell dictionary, so no fuzzy corrections
//! are invented for them. Observed values absent from the canonical
//! reference sets are reported as sorted discrepancy artifacts; that output
//! is diagnostic, never a hard failure.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info};

use crate::{corrections::CorrectionMap, data::Dataset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    District,
    Chiefdom,
    Section,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::District, Level::Chiefdom, Level::Section];

    /// The sheet column carrying this level.
    pub fn column(self) -> &'static str {
        match self {
            Level::District => "District",
            Level::Chiefdom => "Chiefdom",
            Level::Section => "Section",
        }
    }

    pub fn map_file(self) -> &'static str {
        match self {
            Level::District => "district_map.json",
            Level::Chiefdom => "chiefdom_map.json",
            Level::Section => "section_map.json",
        }
    }

    /// File name of the canonical reference set for this level.
    pub fn reference_file(self) -> &'static str {
        match self {
            Level::District => "districts.txt",
            Level::Chiefdom => "chiefdoms.txt",
            Level::Section => "sections.txt",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Level::District => "Districts",
            Level::Chiefdom => "Chiefdoms",
            Level::Section => "Sections",
        }
    }
}

/// Trims and collapses repeated internal whitespace. Location values keep
/// their casing; canonical names are cased.
pub fn normalize_location(raw: &str) -> String {
    raw.split_whitespace().join(" ")
}

pub fn map_path(maps_dir: &Path, level: Level) -> PathBuf {
    maps_dir.join(level.map_file())
}

pub fn maps_exist(maps_dir: &Path) -> bool {
    Level::ALL
        .iter()
        .all(|level| map_path(maps_dir, *level).is_file())
}

/// Builds and persists one identity-seeded map per level from the union of
/// distinct observed values across `sheet_names`. All-or-nothing per level:
/// each map is built fully before it is (atomically) saved.
pub fn build_maps(
    sheets: &BTreeMap<String, Dataset>,
    sheet_names: &[String],
    maps_dir: &Path,
) -> Result<()> {
    for level in Level::ALL {
        let mut map = CorrectionMap::default();
        for name in sheet_names {
            let Some(dataset) = sheets.get(name) else {
                continue;
            };
            let col = dataset
                .require_column(level.column())
                .with_context(|| format!("Building {} map", level.column()))?;
            let observed = dataset
                .distinct_text(col)
                .iter()
                .map(|value| normalize_location(value))
                .filter(|value| !value.is_empty())
                .collect::<BTreeSet<_>>();
            map.extend(CorrectionMap::identity_seed(observed));
        }
        map.save(&map_path(maps_dir, level))?;
        info!(
            "Seeded {} map with {} entr{}",
            level.column(),
            map.len(),
            if map.len() == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}

pub fn load_map(maps_dir: &Path, level: Level) -> Result<CorrectionMap> {
    CorrectionMap::load(&map_path(maps_dir, level))
}

/// Canonical names per level, loaded from flat one-name-per-line files.
pub struct ReferenceSets {
    districts: BTreeSet<String>,
    chiefdoms: BTreeSet<String>,
    sections: BTreeSet<String>,
}

impl ReferenceSets {
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            districts: load_reference(&dir.join(Level::District.reference_file()))?,
            chiefdoms: load_reference(&dir.join(Level::Chiefdom.reference_file()))?,
            sections: load_reference(&dir.join(Level::Section.reference_file()))?,
        })
    }

    pub fn get(&self, level: Level) -> &BTreeSet<String> {
        match level {
            Level::District => &self.districts,
            Level::Chiefdom => &self.chiefdoms,
            Level::Section => &self.sections,
        }
    }
}

fn load_reference(path: &Path) -> Result<BTreeSet<String>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("Reading reference set {path:?}"))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Observed distinct values of one level in one sheet that are absent from
/// the canonical reference set, sorted.
pub fn validate(dataset: &Dataset, level: Level, reference: &BTreeSet<String>) -> Vec<String> {
    let Some(col) = dataset.column_index(level.column()) else {
        debug!(
            "Sheet '{}' has no {} column; nothing to validate",
            dataset.name,
            level.column()
        );
        return Vec::new();
    };
    dataset
        .distinct_text(col)
        .iter()
        .map(|value| normalize_location(value))
        .filter(|value| !value.is_empty() && !reference.contains(value))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Writes the per (version, sheet, level) discrepancy artifact and returns
/// its path.
pub fn write_discrepancies(
    out_dir: &Path,
    version: &str,
    sheet: &str,
    level: Level,
    issues: &[String],
) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Creating discrepancy directory {out_dir:?}"))?;
    let path = out_dir.join(format!("{version}_{sheet}_{}.json", level.plural()));
    let serialized = serde_json::to_string_pretty(issues).context("Serializing discrepancies")?;
    fs::write(&path, serialized)
        .with_context(|| format!("Writing discrepancy report {path:?}"))?;
    Ok(path)
}

/// Validates every sheet against every level, writing one artifact each and
/// logging a summary. Best-effort diagnostics across the whole batch.
pub fn validate_sheets(
    sheets: &BTreeMap<String, Dataset>,
    references: &ReferenceSets,
    version: &str,
    out_dir: &Path,
) -> Result<()> {
    for (name, dataset) in sheets {
        for level in Level::ALL {
            let issues = validate(dataset, level, references.get(level));
            write_discrepancies(out_dir, version, name, level, &issues)?;
            info!(
                "{name} ({version}): {} {} issue(s)",
                issues.len(),
                level.column()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use tempfile::tempdir;

    fn sheet(name: &str, districts: &[&str]) -> Dataset {
        Dataset::new(
            name,
            vec![
                "Timestamp".to_string(),
                "District".to_string(),
                "Chiefdom".to_string(),
                "Section".to_string(),
            ],
            districts
                .iter()
                .map(|d| {
                    vec![
                        None,
                        Some(Value::Text(d.to_string())),
                        Some(Value::Text("Kholifa Rowalla".to_string())),
                        Some(Value::Text("Mabolleh".to_string())),
                    ]
                })
                .collect(),
        )
    }

    #[test]
    fn normalize_location_collapses_whitespace() {
        assert_eq!(normalize_location("  Port   Loko "), "Port Loko");
        assert_eq!(normalize_location("Bo"), "Bo");
    }

    #[test]
    fn build_maps_unions_sheets_with_identity_entries() {
        let temp = tempdir().expect("temp dir");
        let mut sheets = BTreeMap::new();
        sheets.insert("A".to_string(), sheet("A", &["Bo", "Port  Loko"]));
        sheets.insert("B".to_string(), sheet("B", &["Bombali", "Bo"]));
        let names = vec!["A".to_string(), "B".to_string()];

        build_maps(&sheets, &names, temp.path()).expect("build maps");
        assert!(maps_exist(temp.path()));

        let district = load_map(temp.path(), Level::District).expect("load district map");
        assert_eq!(district.len(), 3);
        assert_eq!(district.lookup("Bo"), "Bo");
        assert_eq!(district.lookup("Port Loko"), "Port Loko");
    }

    #[test]
    fn resolved_map_application_is_idempotent() {
        let map = CorrectionMap::identity_seed(["Bo", "Bombali"]);
        for value in ["Bo", "Bombali", "Kailahun"] {
            let once = map.lookup(value);
            let twice = map.lookup(once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn validate_reports_sorted_set_difference() {
        let reference: BTreeSet<String> =
            ["Bo".to_string(), "Bombali".to_string()].into_iter().collect();
        let dataset = sheet("A", &["bo", "Bombali", "Zanzibar", "Atlantis", "Zanzibar"]);
        let issues = validate(&dataset, Level::District, &reference);
        assert_eq!(issues, vec!["Atlantis", "Zanzibar", "bo"]);
    }

    #[test]
    fn validate_without_column_is_empty_diagnostic() {
        let dataset = Dataset::new("NoLoc", vec!["Timestamp".to_string()], vec![]);
        let reference = BTreeSet::new();
        assert!(validate(&dataset, Level::Section, &reference).is_empty());
    }

    #[test]
    fn discrepancy_artifact_written_per_version_sheet_level() {
        let temp = tempdir().expect("temp dir");
        let issues = vec!["Atlantis".to_string()];
        let path = write_discrepancies(temp.path(), "raw", "Follow_Up", Level::District, &issues)
            .expect("write");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("raw_Follow_Up_Districts.json")
        );
        let raw = fs::read_to_string(path).expect("read back");
        let parsed: Vec<String> = serde_json::from_str(&raw).expect("parse");
        assert_eq!(parsed, issues);
    }
}
