//! Terminal presentation of the impact statistics. A thin consumer of the
//! structures in `impact` and `ranking`; nothing here feeds back into the
//! pipeline.

use crate::{
    impact::{AxisSummary, GlobalStats, SheetStats, Summary},
    ranking::ImpactEntry,
    table,
};

pub fn print_report<'a, I>(global: &GlobalStats, sheets: I)
where
    I: IntoIterator<Item = &'a SheetStats>,
{
    println!("Meta-Analysis of Data Cleaning Efforts:");
    print_global(global);
    println!("Sheet Level Statistics:");
    for stats in sheets {
        print_sheet(stats);
    }
}

pub fn print_global(global: &GlobalStats) {
    println!("Global Statistics:");
    println!("\tRows:            {:7}", global.n_rows);
    println!("\tColumns:         {:7}", global.n_cols);
    println!("\tValues:          {:7}", global.n_values);
    println!(
        "\tManual Edits:    {:7} ({:.2}%)",
        global.manual_edits, global.manual_relative
    );
    println!(
        "\tAutomated Edits: {:7} ({:.2}%)",
        global.auto_edits, global.auto_relative
    );
    println!(
        "\tTotal Edits:     {:7} ({:.2}%)",
        global.total_edits, global.total_relative
    );
    println!();
}

pub fn print_sheet(stats: &SheetStats) {
    println!("{}", "-".repeat(65));
    println!("\tSheet Name: {}", stats.sheet);
    println!("\tRows:            {:7}", stats.n_rows);
    println!("\tColumns:         {:7}", stats.n_cols);
    println!("\tValues:          {:7}", stats.n_values);
    println!(
        "\tManual Edits:    {:7} ({:.2}%)",
        stats.manual.count, stats.manual.relative
    );
    println!(
        "\tAutomated Edits: {:7} ({:.2}%)",
        stats.auto.count, stats.auto.relative
    );
    println!(
        "\tTotal Edits:     {:7} ({:.2}%)",
        stats.total.count, stats.total.relative
    );

    println!("\n\tRow Level Statistics:");
    print_axis_table("Row", &stats.row_manual, &stats.row_auto, &stats.row_total);
    println!("\n\tColumn Level Statistics:");
    print_axis_table("Col", &stats.col_manual, &stats.col_auto, &stats.col_total);
    println!();
}

fn print_axis_table(axis: &str, manual: &AxisSummary, auto: &AxisSummary, total: &AxisSummary) {
    let headers = vec![
        "statistic".to_string(),
        format!("{axis} Manual"),
        format!("{axis} Manual Rel."),
        format!("{axis} Auto"),
        format!("{axis} Auto Rel."),
        format!("{axis} Total"),
        format!("{axis} Total Rel."),
    ];
    let rows = STATISTICS
        .iter()
        .map(|(name, pick)| {
            vec![
                name.to_string(),
                format!("{:.2}", pick(&manual.counts)),
                format!("{:.2}", pick(&manual.relative)),
                format!("{:.2}", pick(&auto.counts)),
                format!("{:.2}", pick(&auto.relative)),
                format!("{:.2}", pick(&total.counts)),
                format!("{:.2}", pick(&total.relative)),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
}

type Pick = fn(&Summary) -> f64;

const STATISTICS: [(&str, Pick); 7] = [
    ("mean", |s| s.mean),
    ("std", |s| s.std_dev),
    ("min", |s| s.min),
    ("25%", |s| s.q25),
    ("50%", |s| s.median),
    ("75%", |s| s.q75),
    ("max", |s| s.max),
];

pub fn print_outliers(outliers: &[ImpactEntry]) {
    println!("Column Impact: Outliers");
    for entry in outliers {
        println!("\t{}: {:.2}", entry.label, entry.relative);
    }
}
