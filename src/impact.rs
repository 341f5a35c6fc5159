//! Diff/impact statistics: cell-level inequality between dataset versions
//! and the descriptive aggregates built from it.
//!
//! Three diffs are taken per sheet: raw-vs-manual ("manual edits"),
//! manual-vs-auto ("automated edits"), and raw-vs-auto ("total edits"). Row
//! identity is positional, so the versions of a sheet must agree exactly on
//! shape and column order; a mismatch is fatal for that sheet. Global
//! statistics sum the scalar counts across sheets and recompute percentages
//! from the sums; per-sheet percentages are never averaged, and the
//! distributional summaries stay per-sheet.

use serde::Serialize;

use crate::data::{CleanseError, Dataset};

/// Boolean cell-level inequality matrix between two versions of one sheet.
#[derive(Debug, Clone)]
pub struct DiffMatrix {
    cells: Vec<Vec<bool>>,
    n_rows: usize,
    n_cols: usize,
}

impl DiffMatrix {
    pub fn between(left: &Dataset, right: &Dataset) -> Result<Self, CleanseError> {
        if left.n_rows() != right.n_rows() || left.n_cols() != right.n_cols() {
            return Err(CleanseError::ShapeMismatch {
                sheet: left.name.clone(),
                left_rows: left.n_rows(),
                left_cols: left.n_cols(),
                right_rows: right.n_rows(),
                right_cols: right.n_cols(),
            });
        }
        if left.columns != right.columns {
            return Err(CleanseError::ColumnOrderMismatch {
                sheet: left.name.clone(),
            });
        }
        let cells = left
            .rows
            .iter()
            .zip(&right.rows)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x != y).collect())
            .collect();
        Ok(Self {
            cells,
            n_rows: left.n_rows(),
            n_cols: left.n_cols(),
        })
    }

    pub fn is_set(&self, row: usize, col: usize) -> bool {
        self.cells[row][col]
    }

    /// Changed cells in the whole sheet.
    pub fn total(&self) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|cell| **cell).count())
            .sum()
    }

    /// Changed cells per row.
    pub fn row_counts(&self) -> Vec<usize> {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|cell| **cell).count())
            .collect()
    }

    /// Changed cells per column.
    pub fn col_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_cols];
        for row in &self.cells {
            for (col, changed) in row.iter().enumerate() {
                if *changed {
                    counts[col] += 1;
                }
            }
        }
        counts
    }
}

/// Five-number-style distribution summary: mean, sample standard deviation,
/// min, quartiles, max. Quartiles interpolate linearly between order
/// statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl Summary {
    pub fn describe(values: &[usize]) -> Summary {
        if values.is_empty() {
            return Summary {
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                q25: 0.0,
                median: 0.0,
                q75: 0.0,
                max: 0.0,
            };
        }
        let mut sorted: Vec<f64> = values.iter().map(|v| *v as f64).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let std_dev = if sorted.len() < 2 {
            0.0
        } else {
            let variance =
                sorted.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
            variance.max(0.0).sqrt()
        };
        Summary {
            mean,
            std_dev,
            min: sorted[0],
            q25: percentile(&sorted, 0.25),
            median: percentile(&sorted, 0.50),
            q75: percentile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        }
    }

    /// Rescales every statistic, e.g. from counts to percentages of an axis.
    pub fn scaled(&self, factor: f64) -> Summary {
        Summary {
            mean: self.mean * factor,
            std_dev: self.std_dev * factor,
            min: self.min * factor,
            q25: self.q25 * factor,
            median: self.median * factor,
            q75: self.q75 * factor,
            max: self.max * factor,
        }
    }
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let fraction = position - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditCounts {
    pub count: usize,
    /// Percentage of the sheet's total cell count.
    pub relative: f64,
}

/// Row- or column-axis distribution of one edit kind, as raw counts and as a
/// percentage of the axis extent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisSummary {
    pub counts: Summary,
    pub relative: Summary,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetStats {
    pub sheet: String,
    pub n_rows: usize,
    pub n_cols: usize,
    pub n_values: usize,
    pub manual: EditCounts,
    pub auto: EditCounts,
    pub total: EditCounts,
    pub row_manual: AxisSummary,
    pub row_auto: AxisSummary,
    pub row_total: AxisSummary,
    pub col_manual: AxisSummary,
    pub col_auto: AxisSummary,
    pub col_total: AxisSummary,
    /// Per-column "total edits" percentage, retained unsummarized because it
    /// feeds the ranking stage.
    pub col_total_relative: Vec<f64>,
    pub col_labels: Vec<String>,
}

/// Diffs the three versions of one sheet and aggregates the results.
pub fn sheet_stats(
    raw: &Dataset,
    manual: &Dataset,
    auto: &Dataset,
) -> Result<SheetStats, CleanseError> {
    let diff_manual = DiffMatrix::between(raw, manual)?;
    let diff_auto = DiffMatrix::between(manual, auto)?;
    let diff_total = DiffMatrix::between(raw, auto)?;

    let n_rows = raw.n_rows();
    let n_cols = raw.n_cols();
    let n_values = n_rows * n_cols;
    let value_pct = |count: usize| {
        if n_values == 0 {
            0.0
        } else {
            100.0 * count as f64 / n_values as f64
        }
    };
    let row_pct = if n_cols == 0 { 0.0 } else { 100.0 / n_cols as f64 };
    let col_pct = if n_rows == 0 { 0.0 } else { 100.0 / n_rows as f64 };

    let axis = |counts: Vec<usize>, factor: f64| {
        let summary = Summary::describe(&counts);
        AxisSummary {
            relative: summary.scaled(factor),
            counts: summary,
        }
    };

    let col_total_counts = diff_total.col_counts();
    let col_total_relative = col_total_counts
        .iter()
        .map(|count| *count as f64 * col_pct)
        .collect();

    Ok(SheetStats {
        sheet: raw.name.clone(),
        n_rows,
        n_cols,
        n_values,
        manual: EditCounts {
            count: diff_manual.total(),
            relative: value_pct(diff_manual.total()),
        },
        auto: EditCounts {
            count: diff_auto.total(),
            relative: value_pct(diff_auto.total()),
        },
        total: EditCounts {
            count: diff_total.total(),
            relative: value_pct(diff_total.total()),
        },
        row_manual: axis(diff_manual.row_counts(), row_pct),
        row_auto: axis(diff_auto.row_counts(), row_pct),
        row_total: axis(diff_total.row_counts(), row_pct),
        col_manual: axis(diff_manual.col_counts(), col_pct),
        col_auto: axis(diff_auto.col_counts(), col_pct),
        col_total: axis(diff_total.col_counts(), col_pct),
        col_total_relative,
        col_labels: raw.columns.clone(),
    })
}

/// Monoid sum of the per-sheet scalar counts, with percentages recomputed
/// from the sums. Distributional summaries are deliberately not aggregated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalStats {
    pub n_rows: usize,
    pub n_cols: usize,
    pub n_values: usize,
    pub manual_edits: usize,
    pub auto_edits: usize,
    pub total_edits: usize,
    pub manual_relative: f64,
    pub auto_relative: f64,
    pub total_relative: f64,
}

pub fn global_stats<'a, I>(sheets: I) -> GlobalStats
where
    I: IntoIterator<Item = &'a SheetStats>,
{
    let mut global = GlobalStats::default();
    for stats in sheets {
        global.n_rows += stats.n_rows;
        global.n_cols += stats.n_cols;
        global.n_values += stats.n_values;
        global.manual_edits += stats.manual.count;
        global.auto_edits += stats.auto.count;
        global.total_edits += stats.total.count;
    }
    if global.n_values > 0 {
        let denominator = global.n_values as f64;
        global.manual_relative = 100.0 * global.manual_edits as f64 / denominator;
        global.auto_relative = 100.0 * global.auto_edits as f64 / denominator;
        global.total_relative = 100.0 * global.total_edits as f64 / denominator;
    }
    global
}
