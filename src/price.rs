//! Price/quantity mismatch view: effective spend (unit price times
//! quantity) summed per customer/subscription/product key and compared
//! across the two sides. Coarser than full reconciliation on purpose, so a
//! credit/rebill pair that changes charge type but preserves spend nets out.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::Settings;
use crate::reconcile::{BusinessKey, normalize_component};
use crate::table::Table;
use crate::value;

const KEY_COLUMNS: &[&str] = &["CustomerId", "SubscriptionId", "ProductId"];
const CARRIED_COLUMNS: &[&str] = &["CustomerName", "ProductName", "Category"];

fn decimal_cell(table: &Table, row: usize, column: &str) -> Option<Decimal> {
    let text = table.cell(row, column)?;
    if text.is_empty() {
        return None;
    }
    value::parse_decimal(text)
}

/// Row spend: unit price times quantity, falling back to the subtotal when
/// that product is zero (flat fees, missing prices).
fn contribution(table: &Table, row: usize) -> Decimal {
    let unit_price = decimal_cell(table, row, "UnitPrice").unwrap_or_default();
    let quantity = decimal_cell(table, row, "Quantity").unwrap_or_default();
    let product = unit_price.checked_mul(quantity).unwrap_or(Decimal::ZERO);
    if product.is_zero() {
        decimal_cell(table, row, "Subtotal").unwrap_or_default()
    } else {
        product
    }
}

/// Summed spend per key plus the first row seen for each key, used to carry
/// representative non-key fields into the output.
fn build_prices(
    table: &Table,
    excluded_category: &str,
) -> (BTreeMap<BusinessKey, Decimal>, BTreeMap<BusinessKey, usize>) {
    let key_columns: Vec<String> = KEY_COLUMNS.iter().map(|column| column.to_string()).collect();
    let excluded = normalize_component(excluded_category);
    let mut prices = BTreeMap::new();
    let mut representatives = BTreeMap::new();
    let mut skipped = 0usize;

    for row in 0..table.row_count() {
        let category = normalize_component(table.cell(row, "Category").unwrap_or(""));
        if !excluded.is_empty() && category == excluded {
            continue;
        }
        match BusinessKey::from_row(table, row, &key_columns) {
            Ok(key) => {
                *prices.entry(key.clone()).or_insert(Decimal::ZERO) += contribution(table, row);
                representatives.entry(key).or_insert(row);
            }
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        log::debug!(
            "{skipped} rows in '{}' lacked a complete price key",
            table.name()
        );
    }
    (prices, representatives)
}

/// Reports every key present on both sides whose summed spend differs.
pub fn compare_prices(hub: &Table, vendor: &Table, settings: &Settings) -> Table {
    let (hub_prices, representatives) = build_prices(hub, &settings.excluded_category);
    let (vendor_prices, _) = build_prices(vendor, &settings.excluded_category);

    let mut columns: Vec<String> = KEY_COLUMNS.iter().map(|column| column.to_string()).collect();
    columns.extend(CARRIED_COLUMNS.iter().map(|column| column.to_string()));
    columns.extend(
        ["HubPrice", "VendorPrice", "Difference"]
            .iter()
            .map(|column| column.to_string()),
    );
    let mut out = Table::new("price_differences", columns);

    for (key, hub_price) in &hub_prices {
        let Some(vendor_price) = vendor_prices.get(key) else {
            continue;
        };
        let delta = vendor_price - hub_price;
        if delta.is_zero() {
            continue;
        }
        let representative = representatives.get(key).copied();
        let mut row: Vec<String> = key.components().to_vec();
        for &column in CARRIED_COLUMNS {
            let cell = representative
                .and_then(|index| hub.cell(index, column))
                .unwrap_or("");
            row.push(cell.to_string());
        }
        row.push(hub_price.normalize().to_string());
        row.push(vendor_price.normalize().to_string());
        row.push(delta.normalize().to_string());
        out.push_row(row);
    }
    log::info!("{} keys with price differences", out.row_count());
    out
}
