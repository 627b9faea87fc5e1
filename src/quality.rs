//! Row-level business-rule checks over a canonical table. The validator
//! only observes and logs; it never rewrites cells and never aborts.

use rust_decimal::Decimal;

use crate::config::Settings;
use crate::issues::{Issue, IssueSink};
use crate::schema;
use crate::table::Table;
use crate::value;

/// True when the cell is absent, blank, or parses to exactly zero.
/// Column absence and blank text are deliberately equivalent here.
fn zero_or_blank(table: &Table, row: usize, column: &str) -> bool {
    match table.cell(row, column) {
        None => true,
        Some("") => true,
        Some(text) => value::parse_decimal(text).is_some_and(|number| number.is_zero()),
    }
}

fn cell_decimal(table: &Table, row: usize, column: &str) -> Option<Decimal> {
    let text = table.cell(row, column)?;
    if text.is_empty() {
        return None;
    }
    value::parse_decimal(text)
}

fn row_context(table: &Table, row: usize) -> String {
    let customer = table.cell(row, "CustomerId").unwrap_or("");
    let sku = table.cell(row, "ProductId").unwrap_or("");
    format!("customer={customer} sku={sku}")
}

/// Runs every per-row check plus the per-column blank-share guard.
pub fn validate_table(table: &Table, settings: &Settings, sink: &dyn IssueSink) {
    for row in 0..table.row_count() {
        validate_row(table, row, sink);
    }
    check_blank_share(table, settings.blank_field_threshold, sink);
}

fn validate_row(table: &Table, row: usize, sink: &dyn IssueSink) {
    let line = row + 2;
    let context = row_context(table, row);
    let quantity = cell_decimal(table, row, "Quantity").unwrap_or(Decimal::ZERO);

    if quantity > Decimal::ZERO {
        for &column in schema::CRITICAL_PRICING_COLUMNS {
            if zero_or_blank(table, row, column) {
                sink.record(
                    Issue::warning(column, "Zero or blank value on a row with positive quantity")
                        .with_row(line)
                        .with_raw_value(table.cell(row, column).unwrap_or("").to_string())
                        .with_source(table.name())
                        .with_context(context.clone()),
                );
            }
        }
    }

    if !quantity.is_zero()
        && schema::CRITICAL_PRICING_COLUMNS
            .iter()
            .all(|column| zero_or_blank(table, row, column))
    {
        sink.record(
            Issue::error(
                "Pricing",
                "All pricing fields are zero while quantity is non-zero",
            )
            .with_row(line)
            .with_source(table.name())
            .with_context(context.clone()),
        );
    }

    if let Some(discount) = cell_decimal(table, row, "DiscountPercent") {
        if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
            sink.record(
                Issue::error("DiscountPercent", "Discount percent outside the 0-100 range")
                    .with_row(line)
                    .with_raw_value(table.cell(row, "DiscountPercent").unwrap_or("").to_string())
                    .with_source(table.name())
                    .with_context(context.clone()),
            );
        } else if discount < Decimal::ONE || discount > Decimal::from(90) {
            sink.record(
                Issue::warning(
                    "DiscountPercent",
                    "Discount percent outside the typical 1-90 range",
                )
                .with_row(line)
                .with_raw_value(table.cell(row, "DiscountPercent").unwrap_or("").to_string())
                .with_source(table.name())
                .with_context(context.clone()),
            );
        }
    }

    for column in table.columns() {
        let lowered = column.to_lowercase();
        let text = table.cell(row, column).unwrap_or("");
        if text.is_empty() {
            continue;
        }
        if lowered.contains("date") && value::parse_date(text).is_none() {
            sink.record(
                Issue::error(column.clone(), "Invalid date value")
                    .with_row(line)
                    .with_raw_value(text.to_string())
                    .with_source(table.name())
                    .with_context(context.clone()),
            );
        }
        if lowered.contains("total") {
            if let Some(number) = value::parse_decimal(text) {
                if number < Decimal::ZERO {
                    sink.record(
                        Issue::warning(column.clone(), "Negative total amount")
                            .with_row(line)
                            .with_raw_value(text.to_string())
                            .with_source(table.name())
                            .with_context(context.clone()),
                    );
                }
            }
        }
    }
}

/// One error per guarded column whose blank share exceeds the threshold.
fn check_blank_share(table: &Table, threshold_percent: usize, sink: &dyn IssueSink) {
    let rows = table.row_count();
    if rows == 0 {
        return;
    }
    for &column in schema::BLANK_GUARD_COLUMNS {
        if !table.has_column(column) {
            continue;
        }
        let blank = (0..rows)
            .filter(|&row| table.cell(row, column).unwrap_or("").is_empty())
            .count();
        if blank * 100 > threshold_percent * rows {
            sink.record(
                Issue::error(
                    column,
                    format!("More than {threshold_percent}% of values are blank"),
                )
                .with_source(table.name()),
            );
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

    fn canonical(rows: &[&[&str]]) -> Table {
        let mut table = Table::new(
            "hub_q.csv",
            strings(&[
                "CustomerId",
                "ProductId",
                "ChargeEndDate",
                "Quantity",
                "UnitPrice",
                "DiscountPercent",
                "Subtotal",
                "TaxTotal",
                "Total",
            ]),
        );
        for row in rows {
            table.push_row(strings(row));
        }
        table
    }

    #[test]
    fn priced_row_with_blank_pricing_warns_per_column() {
        let sink = CollectingSink::new();
        let table = canonical(&[&["C-1", "P-1", "", "4", "", "", "10", "1", "11"]]);
        validate_table(&table, &Settings::default(), &sink);

        let issues = sink.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].column, "UnitPrice");
        assert_eq!(issues[0].row, Some(2));
        assert_eq!(issues[0].context.as_deref(), Some("customer=C-1 sku=P-1"));
    }

    #[test]
    fn all_zero_pricing_with_quantity_is_an_error() {
        let sink = CollectingSink::new();
        let table = canonical(&[&["C-1", "P-1", "", "-2", "0", "", "0", "0", "0"]]);
        validate_table(&table, &Settings::default(), &sink);

        let issues = sink.issues();
        // negative quantity skips the positive-quantity warnings
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].column, "Pricing");
        assert_eq!(issues[0].severity, crate::issues::Severity::Error);
    }

    #[test]
    fn discount_bounds_split_errors_and_warnings() {
        let sink = CollectingSink::new();
        let table = canonical(&[
            &["C-1", "P-1", "", "0", "1", "150", "1", "0", "1"],
            &["C-2", "P-2", "", "0", "1", "95", "1", "0", "1"],
            &["C-3", "P-3", "", "0", "1", "50", "1", "0", "1"],
            &["C-4", "P-4", "", "0", "1", "", "1", "0", "1"],
        ]);
        validate_table(&table, &Settings::default(), &sink);

        let issues = sink.issues();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, crate::issues::Severity::Error);
        assert!(issues[0].description.contains("0-100"));
        assert_eq!(issues[1].severity, crate::issues::Severity::Warning);
        assert!(issues[1].description.contains("1-90"));
    }

    #[test]
    fn bad_dates_and_negative_totals_are_flagged() {
        let sink = CollectingSink::new();
        let table = canonical(&[&["C-1", "P-1", "junk", "0", "1", "", "5", "1", "-6"]]);
        validate_table(&table, &Settings::default(), &sink);

        let issues = sink.issues();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|issue| {
            issue.column == "ChargeEndDate" && issue.description == "Invalid date value"
        }));
        assert!(issues.iter().any(|issue| {
            issue.column == "Total" && issue.description == "Negative total amount"
        }));
    }

    #[test]
    fn blank_share_guard_reports_once_per_column() {
        let sink = CollectingSink::new();
        let table = canonical(&[
            &["", "P-1", "", "0", "1", "", "1", "0", "1"],
            &["", "P-2", "", "0", "1", "", "1", "0", "1"],
            &["", "P-3", "", "0", "1", "", "1", "0", "1"],
            &["C-4", "P-4", "", "0", "1", "", "1", "0", "1"],
        ]);
        validate_table(&table, &Settings::default(), &sink);

        let issues = sink.issues();
        let guard: Vec<_> = issues
            .iter()
            .filter(|issue| issue.description.contains("% of values are blank"))
            .collect();
        assert_eq!(guard.len(), 1);
        assert_eq!(guard[0].column, "CustomerId");
        assert!(guard[0].description.contains("25%"));
    }
}
