//! Positional, field-level comparison of two pre-aligned tables. Each cell
//! pair runs through an equality ladder (numeric tolerance, then date
//! tolerance, then fuzzy text) and failures come back as explained
//! discrepancies with a grouped summary.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::Settings;
use crate::fuzzy;
use crate::table::Table;
use crate::value;

/// One failed comparison. `row` is the physical line number in the source
/// files, header counted as line 1. `reason` is value-free grouping text;
/// `explanation` carries the cell values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    pub row: usize,
    pub column: String,
    pub left: String,
    pub right: String,
    pub reason: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiffReport {
    pub discrepancies: Vec<Discrepancy>,
}

impl DiffReport {
    pub fn len(&self) -> usize {
        self.discrepancies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// Per-reason counts, largest group first, ties alphabetical.
    pub fn summary(&self) -> String {
        if self.discrepancies.is_empty() {
            return "No discrepancies".to_string();
        }
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for discrepancy in &self.discrepancies {
            *counts.entry(discrepancy.reason.as_str()).or_default() += 1;
        }
        let mut entries: Vec<(&str, usize)> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        let total = self.discrepancies.len();
        let noun = if total == 1 {
            "discrepancy"
        } else {
            "discrepancies"
        };
        let mut lines = vec![format!("{total} {noun}")];
        for (reason, count) in entries {
            lines.push(format!("  {count} {reason}"));
        }
        lines.join("\n")
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(
            "differences",
            ["Row", "Column", "Left", "Right", "Explanation"]
                .iter()
                .map(|column| column.to_string())
                .collect(),
        );
        for discrepancy in &self.discrepancies {
            table.push_row(vec![
                discrepancy.row.to_string(),
                discrepancy.column.clone(),
                discrepancy.left.clone(),
                discrepancy.right.clone(),
                discrepancy.explanation.clone(),
            ]);
        }
        table
    }
}

/// Compares row *i* of `left` against row *i* of `right` over the shared
/// columns (in left order). Unmatched trailing rows are reported as missing
/// on the shorter side.
pub fn compare(left: &Table, right: &Table, settings: &Settings) -> DiffReport {
    let columns: Vec<String> = left
        .columns()
        .iter()
        .filter(|column| right.has_column(column))
        .cloned()
        .collect();
    if columns.is_empty() {
        log::warn!(
            "no shared columns between '{}' and '{}'",
            left.name(),
            right.name()
        );
    }

    let numeric_tolerance = settings.numeric_tolerance_decimal();
    let rows = left.row_count().max(right.row_count());
    let mut discrepancies = Vec::new();

    for row in 0..rows {
        let line = row + 2;
        if row >= left.row_count() || row >= right.row_count() {
            let side = if row >= left.row_count() {
                "left"
            } else {
                "right"
            };
            discrepancies.push(Discrepancy {
                row: line,
                column: String::new(),
                left: String::new(),
                right: String::new(),
                reason: format!("Row missing on {side} side"),
                explanation: format!("Row {line} missing on {side} side"),
            });
            continue;
        }
        for column in &columns {
            let left_cell = left.cell(row, column).unwrap_or("");
            let right_cell = right.cell(row, column).unwrap_or("");
            if let Some((reason, explanation)) = compare_cells(
                column,
                left_cell,
                right_cell,
                numeric_tolerance,
                settings.date_tolerance_days,
                settings.fuzzy_distance,
            ) {
                discrepancies.push(Discrepancy {
                    row: line,
                    column: column.clone(),
                    left: left_cell.to_string(),
                    right: right_cell.to_string(),
                    reason,
                    explanation,
                });
            }
        }
    }
    DiffReport { discrepancies }
}

fn compare_cells(
    column: &str,
    left: &str,
    right: &str,
    numeric_tolerance: Decimal,
    date_tolerance_days: i64,
    fuzzy_distance: usize,
) -> Option<(String, String)> {
    if left.is_empty() && right.is_empty() {
        return None;
    }
    if left.is_empty() || right.is_empty() {
        let side = if left.is_empty() { "left" } else { "right" };
        return Some((
            "Blank on one side".to_string(),
            format!("{column} is blank on the {side} side"),
        ));
    }
    if let (Some(left_number), Some(right_number)) =
        (value::parse_decimal(left), value::parse_decimal(right))
    {
        let delta = (right_number - left_number).abs();
        if delta <= numeric_tolerance {
            return None;
        }
        let unit = if column.contains("Percent") {
            " percentage points"
        } else {
            ""
        };
        return Some((
            "Numeric difference beyond tolerance".to_string(),
            format!(
                "{column} differs by {}{unit} (left {left}, right {right})",
                delta.normalize()
            ),
        ));
    }
    if let (Some(left_date), Some(right_date)) = (value::parse_date(left), value::parse_date(right))
    {
        let days = (right_date - left_date).num_days().abs();
        if days <= date_tolerance_days {
            return None;
        }
        let noun = if days == 1 { "day" } else { "days" };
        return Some((
            "Date difference beyond tolerance".to_string(),
            format!("{column} differs by {days} {noun} (left {left}, right {right})"),
        ));
    }
    if fuzzy::is_match(left, right, fuzzy_distance) {
        return None;
    }
    Some((
        "Text mismatch".to_string(),
        format!("{column} differs (left '{left}', right '{right}')"),
    ))
}
