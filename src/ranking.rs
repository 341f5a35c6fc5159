//! Column impact ranking and outlier selection.
//!
//! Every (sheet, column) pair's total-edit percentage becomes one labeled
//! entry in a flat list. Entries are sorted by label first and then
//! stable-sorted by value, so equal percentages keep alphabetical order.

use serde::Serialize;

use crate::impact::SheetStats;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactEntry {
    /// `"<sheet> - <column>"`.
    pub label: String,
    /// Total-edit percentage of the column.
    pub relative: f64,
}

/// Flattens per-sheet column percentages into ranked entries, ascending by
/// value with alphabetical ties.
pub fn rank<'a, I>(sheets: I) -> Vec<ImpactEntry>
where
    I: IntoIterator<Item = &'a SheetStats>,
{
    let mut entries: Vec<ImpactEntry> = sheets
        .into_iter()
        .flat_map(|stats| {
            stats
                .col_labels
                .iter()
                .zip(&stats.col_total_relative)
                .map(|(column, relative)| ImpactEntry {
                    label: format!("{} - {}", stats.sheet, column),
                    relative: *relative,
                })
        })
        .collect();
    entries.sort_by(|a, b| a.label.cmp(&b.label));
    entries.sort_by(|a, b| a.relative.total_cmp(&b.relative));
    entries
}

/// Entries at or beyond either threshold, listed from highest to lowest
/// percentage.
pub fn outliers(ranked: &[ImpactEntry], low: f64, high: f64) -> Vec<ImpactEntry> {
    ranked
        .iter()
        .rev()
        .filter(|entry| entry.relative <= low || entry.relative >= high)
        .cloned()
        .collect()
}

/// Entries strictly between the thresholds, retained for the visual summary.
pub fn chart_entries(ranked: &[ImpactEntry], low: f64, high: f64) -> Vec<ImpactEntry> {
    ranked
        .iter()
        .filter(|entry| entry.relative > low && entry.relative < high)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, Value};
    use crate::impact::sheet_stats;

    fn entry(label: &str, relative: f64) -> ImpactEntry {
        ImpactEntry {
            label: label.to_string(),
            relative,
        }
    }

    fn ranked_fixture() -> Vec<ImpactEntry> {
        vec![
            entry("a - zeta", 50.0),
            entry("a - alpha", 0.0),
            entry("b - mid", 50.0),
            entry("a - hot", 100.0),
        ]
    }

    #[test]
    fn equal_values_keep_alphabetical_order() {
        let mut entries = ranked_fixture();
        entries.sort_by(|a, b| a.label.cmp(&b.label));
        entries.sort_by(|a, b| a.relative.total_cmp(&b.relative));
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["a - alpha", "a - zeta", "b - mid", "a - hot"]);
    }

    #[test]
    fn outliers_at_or_beyond_thresholds_high_to_low() {
        let mut entries = ranked_fixture();
        entries.sort_by(|a, b| a.label.cmp(&b.label));
        entries.sort_by(|a, b| a.relative.total_cmp(&b.relative));

        let outliers = outliers(&entries, 1.0, 100.0);
        let labels: Vec<&str> = outliers.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["a - hot", "a - alpha"]);

        let chart = chart_entries(&entries, 1.0, 100.0);
        let labels: Vec<&str> = chart.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["a - zeta", "b - mid"]);
    }

    #[test]
    fn rank_flattens_sheet_columns_with_labels() {
        let columns = vec!["c0".to_string(), "c1".to_string()];
        let raw = Dataset::new(
            "Follow_Up",
            columns.clone(),
            vec![vec![Some(Value::Integer(1)), Some(Value::Integer(2))]],
        );
        let manual = Dataset::new(
            "Follow_Up",
            columns,
            vec![vec![Some(Value::Integer(1)), Some(Value::Integer(3))]],
        );
        let stats = sheet_stats(&raw, &manual, &manual).expect("stats");
        let ranked = rank([&stats]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].label, "Follow_Up - c0");
        assert_eq!(ranked[0].relative, 0.0);
        assert_eq!(ranked[1].label, "Follow_Up - c1");
        assert_eq!(ranked[1].relative, 100.0);
    }
}
