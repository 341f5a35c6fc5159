//! Persisted key -> value correction maps with identity fallback.
//!
//! A map is built once per (sheet, column) pair, or once per shared location
//! level, and persisted as pretty JSON with sorted keys so rebuilds are
//! idempotent and the files stay git-diffable and hand-editable. A key absent
//! from the entries is returned unchanged: the pipeline prefers silently
//! preserving unknown data over dropping it.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    data::Dataset,
    speller::{SpellCorrector, normalize_sample},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrectionMap {
    entries: BTreeMap<String, String>,
}

impl CorrectionMap {
    /// Returns the mapped value, or `key` unchanged when no entry exists.
    /// Never fails.
    pub fn lookup<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries.get(key).map_or(key, |value| value.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Seeds every value as mapping to itself. The conservative starting
    /// point for location maps, where fuzzy correction is off the table.
    pub fn identity_seed<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = Self::default();
        for value in values {
            let value = value.into();
            map.entries.insert(value.clone(), value);
        }
        map
    }

    /// Merges `other` into `self`, later entries winning.
    pub fn extend(&mut self, other: CorrectionMap) {
        self.entries.extend(other.entries);
    }

    /// Builds one entry per distinct source value using the supplied
    /// corrector. Values are corrected in parallel and re-paired with their
    /// inputs positionally; the result is deterministic for identical inputs
    /// and corrector configuration.
    pub fn build(values: &[String], corrector: &SpellCorrector, threshold: u64) -> Self {
        let corrected = corrector.correct_all(values, threshold);
        let mut map = Self::default();
        for (source, fixed) in values.iter().zip(corrected) {
            map.entries.insert(source.clone(), fixed);
        }
        map
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading correction map {path:?}"))?;
        let entries = serde_json::from_str(&raw)
            .with_context(|| format!("Parsing correction map {path:?}"))?;
        Ok(Self { entries })
    }

    /// Persists the map atomically: the entries are written to a sibling
    /// temp file and renamed into place, so a partially built map is never
    /// visible at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating map directory {parent:?}"))?;
        }
        let serialized =
            serde_json::to_string_pretty(&self.entries).context("Serializing correction map")?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serialized)
            .with_context(|| format!("Writing correction map staging file {staging:?}"))?;
        fs::rename(&staging, path)
            .with_context(|| format!("Moving correction map into place at {path:?}"))?;
        Ok(())
    }
}

/// Persistence location for one (sheet, column) map.
pub fn column_map_path(maps_dir: &Path, sheet: &str, column: &str) -> PathBuf {
    maps_dir.join(format!("{sheet}_{column}_map.json"))
}

/// Collects the normalized distinct text values of a column, excluding values
/// that are empty after normalization (the absence marker is never mapped).
pub fn normalized_distinct_values(dataset: &Dataset, col: usize) -> Vec<String> {
    let mut values: Vec<String> = dataset
        .distinct_text(col)
        .iter()
        .map(|value| normalize_sample(value))
        .filter(|value| !value.is_empty())
        .collect();
    values.sort();
    values.dedup();
    values
}

/// Loads the persisted map for a (sheet, column) pair, or synchronously
/// builds and persists it when absent. Build-then-persist is atomic from the
/// caller's perspective.
pub fn load_or_build(
    maps_dir: &Path,
    dataset: &Dataset,
    column: &str,
    corrector: &SpellCorrector,
    threshold: u64,
) -> Result<CorrectionMap> {
    let path = column_map_path(maps_dir, &dataset.name, column);
    if path.is_file() {
        return CorrectionMap::load(&path);
    }
    let col = dataset.require_column(column)?;
    let values = normalized_distinct_values(dataset, col);
    let map = CorrectionMap::build(&values, corrector, threshold);
    map.save(&path)?;
    info!(
        "Built correction map for {}.{} ({} entr{})",
        dataset.name,
        column,
        map.len(),
        if map.len() == 1 { "y" } else { "ies" }
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn lookup_falls_back_to_identity() {
        let mut map = CorrectionMap::default();
        map.insert("freetwon", "freetown");
        assert_eq!(map.lookup("freetwon"), "freetown");
        assert_eq!(map.lookup("makeni"), "makeni");
    }

    #[test]
    fn save_and_load_round_trip_with_sorted_keys() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("maps").join("sheet_col_map.json");
        let mut map = CorrectionMap::default();
        map.insert("zulu", "zulu");
        map.insert("alpha", "alpha");
        map.save(&path).expect("save");

        let raw = std::fs::read_to_string(&path).expect("read back");
        let alpha_at = raw.find("alpha").expect("alpha present");
        let zulu_at = raw.find("zulu").expect("zulu present");
        assert!(alpha_at < zulu_at, "keys must be persisted sorted");
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = CorrectionMap::load(&path).expect("load");
        assert_eq!(loaded, map);
    }

    #[test]
    fn persisted_file_is_stable_across_rebuilds() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("map.json");
        let corrector = SpellCorrector::from_entries([("water", 100u64)]);
        let values = vec!["watre".to_string(), "water".to_string()];

        CorrectionMap::build(&values, &corrector, 10)
            .save(&path)
            .expect("first save");
        let first = std::fs::read(&path).expect("first read");
        CorrectionMap::build(&values, &corrector, 10)
            .save(&path)
            .expect("second save");
        let second = std::fs::read(&path).expect("second read");
        assert_eq!(first, second);
    }

    #[test]
    fn build_pairs_sources_with_suggestions() {
        let corrector = SpellCorrector::from_entries([("water", 100u64), ("well", 50)]);
        let values = vec!["watre".to_string(), "wel".to_string(), "qqq".to_string()];
        let map = CorrectionMap::build(&values, &corrector, 10);
        assert_eq!(map.lookup("watre"), "water");
        assert_eq!(map.lookup("wel"), "well");
        // No candidate: identity entry, not a dropped key.
        assert_eq!(map.lookup("qqq"), "qqq");
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn load_or_build_prefers_persisted_copy() {
        let temp = tempdir().expect("temp dir");
        let dataset = Dataset::new(
            "Trigger_Other",
            vec!["ts".to_string(), "t_q4".to_string()],
            vec![vec![None, Some(Value::Text("Watre".to_string()))]],
        );
        let corrector = SpellCorrector::from_entries([("water", 100u64)]);

        let built = load_or_build(temp.path(), &dataset, "t_q4", &corrector, 10).expect("build");
        assert_eq!(built.lookup("watre"), "water");

        // Hand-edit the persisted map; a second call must load it verbatim.
        let path = column_map_path(temp.path(), "Trigger_Other", "t_q4");
        let mut edited = CorrectionMap::default();
        edited.insert("watre", "rainwater");
        edited.save(&path).expect("save edited");
        let reloaded =
            load_or_build(temp.path(), &dataset, "t_q4", &corrector, 10).expect("reload");
        assert_eq!(reloaded.lookup("watre"), "rainwater");
    }

    #[test]
    fn normalized_distinct_values_excludes_absence_markers() {
        let dataset = Dataset::new(
            "s",
            vec!["c".to_string()],
            vec![
                vec![Some(Value::Text("  Water. ".to_string()))],
                vec![Some(Value::Text("\" . \"".to_string()))],
                vec![None],
            ],
        );
        assert_eq!(normalized_distinct_values(&dataset, 0), vec!["water"]);
    }

    proptest! {
        #[test]
        fn identity_fallback_for_any_unmapped_key(key in "[a-z ]{0,24}") {
            let map = CorrectionMap::default();
            prop_assert_eq!(map.lookup(&key), key.as_str());
        }

        #[test]
        fn identity_seed_is_a_no_op_mapping(value in "[a-zA-Z ]{1,24}") {
            let map = CorrectionMap::identity_seed([value.clone()]);
            prop_assert_eq!(map.lookup(&value), value.as_str());
        }
    }
}
