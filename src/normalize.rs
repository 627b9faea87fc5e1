//! Cell-level cleanup applied to a raw table before mapping. Column names
//! decide the treatment: dates go to ISO form, numeric columns to plain
//! decimal text, identifier-like columns keep their text as-is apart from
//! whitespace, and everything else gets whitespace collapse plus a
//! leading-zero strip on all-digit values.

use itertools::Itertools;

use crate::issues::{Issue, IssueSink};
use crate::schema;
use crate::table::Table;
use crate::value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Date,
    Numeric,
    Identifier,
    Text,
}

fn classify(name: &str) -> ColumnKind {
    if schema::is_date_column(name) {
        ColumnKind::Date
    } else if schema::is_numeric_column(name) {
        ColumnKind::Numeric
    } else if schema::is_identifier_column(name) {
        ColumnKind::Identifier
    } else {
        ColumnKind::Text
    }
}

/// Drops non-printable control characters; CR, LF, and TAB survive here and
/// fold into spaces during whitespace collapse.
fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\r' | '\n' | '\t'))
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

/// All-digit text drops leading zeros ("007" reads as 7); identifier
/// columns are exempt so codes like "00042" survive.
fn strip_leading_zeros(text: &str) -> Option<String> {
    if text.len() > 1 && text.starts_with('0') && text.bytes().all(|b| b.is_ascii_digit()) {
        let stripped = text.trim_start_matches('0');
        if stripped.is_empty() {
            Some("0".to_string())
        } else {
            Some(stripped.to_string())
        }
    } else {
        None
    }
}

/// Normalizes every cell in place. Unparsable dates and numbers are logged
/// as warnings and keep their cleaned text so the value stays visible
/// downstream.
pub fn normalize_table(table: &mut Table, sink: &dyn IssueSink) {
    let kinds: Vec<ColumnKind> = table.columns().iter().map(|name| classify(name)).collect();
    let columns: Vec<String> = table.columns().to_vec();
    let source = table.name().to_string();

    for (row_index, row) in table.rows_mut().iter_mut().enumerate() {
        for (position, cell) in row.iter_mut().enumerate() {
            let kind = kinds.get(position).copied().unwrap_or(ColumnKind::Text);
            let original = cell.clone();
            let cleaned = collapse_whitespace(&strip_control(&original));
            if cleaned.is_empty() {
                *cell = cleaned;
                continue;
            }
            let replacement = match kind {
                ColumnKind::Date => match value::parse_date(&cleaned) {
                    Some(date) => value::format_date(date),
                    None => {
                        sink.record(
                            Issue::warning(columns[position].clone(), "Unparsable date value")
                                .with_row(row_index + 2)
                                .with_raw_value(original)
                                .with_source(source.clone()),
                        );
                        cleaned
                    }
                },
                ColumnKind::Numeric => match value::parse_decimal(&cleaned) {
                    Some(number) => number.to_string(),
                    None => {
                        sink.record(
                            Issue::warning(columns[position].clone(), "Unparsable numeric value")
                                .with_row(row_index + 2)
                                .with_raw_value(original)
                                .with_source(source.clone()),
                        );
                        cleaned
                    }
                },
                ColumnKind::Identifier => cleaned,
                ColumnKind::Text => strip_leading_zeros(&cleaned).unwrap_or(cleaned),
            };
            *cell = replacement;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::CollectingSink;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn sample() -> Table {
        let mut table = Table::new(
            "hub_june.csv",
            strings(&[
                "CustomerName",
                "CustomerId",
                "InvoiceNumber",
                "ChargeStartDate",
                "Quantity",
                "UnitPrice",
                "Total",
            ]),
        );
        table.push_row(strings(&[
            "  Acme   Corp ",
            "007",
            "0042",
            "06/15/2024",
            " 4 ",
            "$1,234.50",
            "4,938.00",
        ]));
        table.push_row(strings(&[
            "Globex",
            "T-2",
            "INV-9",
            "not a date",
            "4",
            "oops",
            "",
        ]));
        table
    }

    #[test]
    fn cleans_each_column_by_kind() {
        let sink = CollectingSink::new();
        let mut table = sample();
        normalize_table(&mut table, &sink);

        assert_eq!(table.cell(0, "CustomerName"), Some("Acme Corp"));
        // identifier columns keep leading zeros
        assert_eq!(table.cell(0, "CustomerId"), Some("007"));
        assert_eq!(table.cell(0, "InvoiceNumber"), Some("0042"));
        assert_eq!(table.cell(0, "ChargeStartDate"), Some("2024-06-15"));
        assert_eq!(table.cell(0, "Quantity"), Some("4"));
        assert_eq!(table.cell(0, "UnitPrice"), Some("1234.50"));
        assert_eq!(table.cell(0, "Total"), Some("4938.00"));
    }

    #[test]
    fn unparsable_values_warn_and_keep_cleaned_text() {
        let sink = CollectingSink::new();
        let mut table = sample();
        normalize_table(&mut table, &sink);

        assert_eq!(table.cell(1, "ChargeStartDate"), Some("not a date"));
        assert_eq!(table.cell(1, "UnitPrice"), Some("oops"));
        assert_eq!(table.cell(1, "Total"), Some(""));

        let issues = sink.issues();
        let date_issue = issues
            .iter()
            .find(|issue| issue.description.contains("date"))
            .unwrap();
        assert_eq!(date_issue.row, Some(3));
        assert_eq!(date_issue.raw_value.as_deref(), Some("not a date"));
        let numeric_issue = issues
            .iter()
            .find(|issue| issue.description.contains("numeric"))
            .unwrap();
        assert_eq!(numeric_issue.column, "UnitPrice");
        // blank cells never warn
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn control_characters_are_stripped() {
        let sink = CollectingSink::new();
        let mut table = Table::new("hub_ctl.csv", strings(&["CustomerName"]));
        table.push_row(strings(&["Acme\u{0007} Corp\nLtd"]));
        normalize_table(&mut table, &sink);

        assert_eq!(table.cell(0, "CustomerName"), Some("Acme Corp Ltd"));
        assert!(sink.issues().is_empty());
    }

    #[test]
    fn all_digit_text_drops_leading_zeros() {
        let sink = CollectingSink::new();
        let mut table = Table::new("hub_zeros.csv", strings(&["CustomerName", "Category"]));
        table.push_row(strings(&["00750", "000"]));
        normalize_table(&mut table, &sink);

        assert_eq!(table.cell(0, "CustomerName"), Some("750"));
        assert_eq!(table.cell(0, "Category"), Some("0"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let sink = CollectingSink::new();
        let mut table = sample();
        normalize_table(&mut table, &sink);
        let first: Vec<Vec<String>> = table.rows().to_vec();
        normalize_table(&mut table, &sink);
        assert_eq!(table.rows(), first.as_slice());
    }
}
