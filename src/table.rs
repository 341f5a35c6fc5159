//! Minimal elastic-width table rendering for terminal reports.

use std::fmt::Write as _;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }
    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(3))).collect();
    let separator_widths: Vec<usize> = widths.iter().map(|w| (*w).max(3)).collect();
    let _ = writeln!(output, "{}", format_row(&separator, &separator_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized: String = value
            .chars()
            .map(|ch| if matches!(ch, '\n' | '\r' | '\t') { ' ' } else { ch })
            .collect();
        let padding = widths[idx].saturating_sub(sanitized.chars().count());
        let mut cell = sanitized;
        cell.push_str(&" ".repeat(padding));
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let headers = vec!["name".to_string(), "value".to_string()];
        let rows = vec![
            vec!["row".to_string(), "1".to_string()],
            vec!["a much longer row".to_string(), "22".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("name"));
        assert!(lines[2].ends_with('1'));
        let value_column = lines[3].rfind("22").expect("value present");
        assert_eq!(lines[2].rfind('1').expect("value present"), value_column);
    }
}
