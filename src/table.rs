//! Plain-text tables for terminal summaries.

use std::borrow::Cow;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Renders `rows` under `headers`. Columns where every non-empty cell is
/// numeric are right-aligned.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    let mut numeric = vec![true; column_count];

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
            if !cell.is_empty() && !looks_numeric(cell) {
                numeric[idx] = false;
            }
        }
    }
    let aligns = numeric
        .iter()
        .map(|&n| if n && !rows.is_empty() { Align::Right } else { Align::Left })
        .collect::<Vec<_>>();

    let mut output = String::new();
    let header_cells = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&header_cells, &widths, &aligns));

    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(
        output,
        "{}",
        format_row(&separator, &widths, &vec![Align::Left; column_count])
    );

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &aligns));
    }
    output
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Two-column `metric  value` report.
pub fn print_metrics(metrics: &[(&str, String)]) {
    let rows = metrics
        .iter()
        .map(|(name, value)| vec![name.to_string(), value.clone()])
        .collect::<Vec<_>>();
    print_table(&["metric", "value"], &rows);
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .zip(aligns)
        .map(|((value, width), align)| {
            let cell = sanitize_cell(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&cell)));
            match align {
                Align::Left => format!("{cell}{padding}"),
                Align::Right => format!("{padding}{cell}"),
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn looks_numeric(value: &str) -> bool {
    value
        .trim()
        .trim_start_matches('-')
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        && value.chars().any(|c| c.is_ascii_digit())
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
