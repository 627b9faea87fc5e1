//! Business-key reconciliation. Both canonical tables are grouped by a
//! composite key, numeric totals are aggregated per key, and every key is
//! classified as matched, mismatched, missing on one side, or a data error.
//! Every key ends up either in the result table or in the skip counts;
//! nothing is dropped silently.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use itertools::Itertools;
use rust_decimal::Decimal;

use crate::config::Settings;
use crate::issues::{Issue, IssueSink, Severity};
use crate::schema;
use crate::table::Table;
use crate::value;

const AGGREGATE_COLUMNS: &[&str] = &["Quantity", "UnitPrice", "Subtotal", "TaxTotal", "Total"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Matched,
    Mismatched,
    MissingInVendor,
    MissingInHub,
    DataError,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Matched => "Matched",
            Status::Mismatched => "Mismatched",
            Status::MissingInVendor => "Missing in vendor",
            Status::MissingInHub => "Missing in hub",
            Status::DataError => "Data Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite business key. Components are whitespace-collapsed and
/// upper-cased, so keying is case- and whitespace-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusinessKey {
    components: Vec<String>,
}

impl BusinessKey {
    /// Builds the key for a row. A blank component makes the row unkeyable
    /// and the offending column name is returned instead.
    pub fn from_row(table: &Table, row: usize, columns: &[String]) -> Result<BusinessKey, String> {
        let mut components = Vec::with_capacity(columns.len());
        for column in columns {
            let component = normalize_component(table.cell(row, column).unwrap_or(""));
            if component.is_empty() {
                return Err(column.clone());
            }
            components.push(component);
        }
        Ok(BusinessKey { components })
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }
}

impl fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.iter().join("|"))
    }
}

pub(crate) fn normalize_component(text: &str) -> String {
    text.split_whitespace().join(" ").to_uppercase()
}

/// Aggregated totals for one key on one side. Unit price is quantity
/// weighted: accumulated price*quantity over accumulated quantity.
#[derive(Debug, Clone, Default)]
pub struct GroupTotals {
    pub quantity: Decimal,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    price_quantity: Decimal,
    pub rows: usize,
}

impl GroupTotals {
    fn absorb(&mut self, table: &Table, row: usize) {
        let quantity = decimal_cell(table, row, "Quantity");
        let unit_price = decimal_cell(table, row, "UnitPrice");
        self.quantity += quantity.unwrap_or_default();
        self.subtotal += decimal_cell(table, row, "Subtotal").unwrap_or_default();
        self.tax_total += decimal_cell(table, row, "TaxTotal").unwrap_or_default();
        self.total += decimal_cell(table, row, "Total").unwrap_or_default();
        if let (Some(price), Some(quantity)) = (unit_price, quantity) {
            self.price_quantity += price.checked_mul(quantity).unwrap_or(Decimal::ZERO);
        }
        self.rows += 1;
    }

    pub fn unit_price(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.price_quantity
                .checked_div(self.quantity)
                .unwrap_or(Decimal::ZERO)
        }
    }
}

fn decimal_cell(table: &Table, row: usize, column: &str) -> Option<Decimal> {
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

struct SideIndex {
    groups: BTreeMap<BusinessKey, GroupTotals>,
    /// Unkeyable rows: (row index, blank key column).
    unkeyed: Vec<(usize, String)>,
    /// Complete keys whose rows were dropped by tenant exclusion.
    excluded: BTreeSet<BusinessKey>,
}

fn build_index(
    table: &Table,
    key_columns: &[String],
    excluded_tenants: &BTreeSet<String>,
    sink: &dyn IssueSink,
) -> SideIndex {
    let mut index = SideIndex {
        groups: BTreeMap::new(),
        unkeyed: Vec::new(),
        excluded: BTreeSet::new(),
    };
    for row in 0..table.row_count() {
        let line = row + 2;
        let tenant = normalize_component(table.cell(row, "CustomerId").unwrap_or(""));
        if !tenant.is_empty() && excluded_tenants.contains(&tenant) {
            sink.record(
                Issue::info("CustomerId", "Excluded tenant")
                    .with_row(line)
                    .with_raw_value(table.cell(row, "CustomerId").unwrap_or("").to_string())
                    .with_source(table.name()),
            );
            if let Ok(key) = BusinessKey::from_row(table, row, key_columns) {
                index.excluded.insert(key);
            }
            continue;
        }
        match BusinessKey::from_row(table, row, key_columns) {
            Ok(key) => {
                index.groups.entry(key).or_default().absorb(table, row);
            }
            Err(column) => {
                sink.record(
                    Issue::error(column.clone(), "Blank business key component")
                        .with_row(line)
                        .with_source(table.name())
                        .with_context(row_context(table, row)),
                );
                index.unkeyed.push((row, column));
            }
        }
    }
    for (key, totals) in &index.groups {
        if totals.rows > 1 {
            let severity = if totals.rows > 5 {
                Severity::Error
            } else {
                Severity::Warning
            };
            sink.record(
                Issue::new(severity, "BusinessKey", "Duplicate business key")
                    .with_source(table.name())
                    .with_context(key.to_string()),
            );
        }
    }
    index
}

/// Renames legacy financial headers to canonical ones and guarantees the
/// aggregate and key columns exist, so later lookups never miss.
fn prepare(table: &Table, key_columns: &[String]) -> Table {
    let mut prepared = table.clone();
    for &(legacy, canonical) in schema::LEGACY_FINANCIAL_ALIASES {
        prepared.rename_column(legacy, canonical);
    }
    for &column in AGGREGATE_COLUMNS {
        prepared.ensure_column(column);
    }
    for column in key_columns {
        prepared.ensure_column(column);
    }
    prepared
}

fn partner_values(table: &Table) -> BTreeSet<String> {
    let Some(position) = table.column_index("PartnerId") else {
        return BTreeSet::new();
    };
    (0..table.row_count())
        .filter_map(|row| table.cell_at(row, position))
        .map(normalize_component)
        .filter(|partner| !partner.is_empty())
        .collect()
}

/// Narrows the vendor table to the shared partner when both sides name
/// exactly one, identical identifier; anything else is logged and the
/// filter is skipped so no row disappears under ambiguity.
fn apply_partner_filter(hub: &Table, vendor: &mut Table, sink: &dyn IssueSink) {
    let hub_partners = partner_values(hub);
    let vendor_partners = partner_values(vendor);
    if hub_partners.is_empty() && vendor_partners.is_empty() {
        return;
    }
    if hub_partners.len() == 1 && hub_partners == vendor_partners {
        let Some(partner) = hub_partners.iter().next() else {
            return;
        };
        let Some(position) = vendor.column_index("PartnerId") else {
            return;
        };
        let before = vendor.row_count();
        vendor.retain_rows(|row| {
            row.get(position)
                .map(|cell| normalize_component(cell) == *partner)
                .unwrap_or(false)
        });
        let removed = before - vendor.row_count();
        if removed > 0 {
            log::info!("partner filter removed {removed} vendor rows outside '{partner}'");
        }
    } else {
        sink.record(
            Issue::warning(
                "PartnerId",
                "Partner identifiers do not line up; vendor filter skipped",
            )
            .with_source(vendor.name()),
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconSummary {
    pub matched: usize,
    pub mismatched: usize,
    pub missing_in_vendor: usize,
    pub missing_in_hub: usize,
    pub data_errors: usize,
    pub keys_total: usize,
    pub keys_reported: usize,
    pub keys_skipped: usize,
    pub duplicate_keys: usize,
}

impl fmt::Display for ReconSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Matched: {} | Mismatched: {} | Missing in vendor: {} | Missing in hub: {} | \
             Data errors: {} | Keys: {} total, {} reported, {} skipped, {} duplicates",
            self.matched,
            self.mismatched,
            self.missing_in_vendor,
            self.missing_in_hub,
            self.data_errors,
            self.keys_total,
            self.keys_reported,
            self.keys_skipped,
            self.duplicate_keys
        )
    }
}

pub struct ReconcileOutcome {
    pub table: Table,
    pub summary: ReconSummary,
}

pub fn reconcile(
    hub: &Table,
    vendor: &Table,
    settings: &Settings,
    strict: bool,
    sink: &dyn IssueSink,
) -> ReconcileOutcome {
    let key_columns: Vec<String> = settings.key_columns_for(strict).to_vec();
    let hub = prepare(hub, &key_columns);
    let mut vendor = prepare(vendor, &key_columns);
    apply_partner_filter(&hub, &mut vendor, sink);

    let excluded_tenants: BTreeSet<String> = settings
        .excluded_tenants
        .iter()
        .map(|tenant| normalize_component(tenant))
        .collect();
    let hub_index = build_index(&hub, &key_columns, &excluded_tenants, sink);
    let vendor_index = build_index(&vendor, &key_columns, &excluded_tenants, sink);

    for key in hub_index.groups.keys() {
        log::debug!("hub key {key}");
    }
    for key in vendor_index.groups.keys() {
        log::debug!("vendor key {key}");
    }
    let intersection = hub_index
        .groups
        .keys()
        .filter(|key| vendor_index.groups.contains_key(*key))
        .count();
    log::info!(
        "{} hub keys, {} vendor keys, {} in both",
        hub_index.groups.len(),
        vendor_index.groups.len(),
        intersection
    );

    let quantity_tolerance = settings.quantity_tolerance_decimal();
    let amount_tolerance = settings.amount_tolerance_decimal();
    let high_priority = settings.high_priority_delta_decimal();

    let mut out = Table::new("reconciliation", result_columns(&key_columns));
    let mut summary = ReconSummary::default();

    // unkeyable rows come first, keeping their own side's amounts visible
    for (row, column) in &hub_index.unkeyed {
        out.push_row(data_error_row(&hub, *row, &key_columns, column, true));
        summary.data_errors += 1;
    }
    for (row, column) in &vendor_index.unkeyed {
        out.push_row(data_error_row(&vendor, *row, &key_columns, column, false));
        summary.data_errors += 1;
    }

    for (key, hub_totals) in &hub_index.groups {
        match vendor_index.groups.get(key) {
            None => {
                out.push_row(result_row(
                    Status::MissingInVendor,
                    key,
                    Some(hub_totals),
                    None,
                    String::new(),
                    false,
                ));
                summary.missing_in_vendor += 1;
                summary.keys_reported += 1;
            }
            Some(vendor_totals) => {
                let fields = [
                    (
                        "Quantity",
                        hub_totals.quantity,
                        vendor_totals.quantity,
                        quantity_tolerance,
                        false,
                    ),
                    (
                        "Subtotal",
                        hub_totals.subtotal,
                        vendor_totals.subtotal,
                        amount_tolerance,
                        true,
                    ),
                    (
                        "TaxTotal",
                        hub_totals.tax_total,
                        vendor_totals.tax_total,
                        amount_tolerance,
                        true,
                    ),
                    (
                        "Total",
                        hub_totals.total,
                        vendor_totals.total,
                        amount_tolerance,
                        true,
                    ),
                ];
                let mut deltas = Vec::new();
                let mut high_field: Option<&'static str> = None;
                for (name, hub_value, vendor_value, tolerance, money) in fields {
                    let delta = vendor_value - hub_value;
                    if delta.abs() > tolerance {
                        deltas.push(format!("{name}:{}", signed(delta)));
                        if money && delta.abs() >= high_priority && high_field.is_none() {
                            high_field = Some(name);
                        }
                    }
                }
                if deltas.is_empty() {
                    out.push_row(result_row(
                        Status::Matched,
                        key,
                        Some(hub_totals),
                        Some(vendor_totals),
                        String::new(),
                        false,
                    ));
                    summary.matched += 1;
                } else {
                    if let Some(field) = high_field {
                        sink.record(
                            Issue::error(field, "Delta above the high-priority threshold")
                                .with_context(key.to_string()),
                        );
                    }
                    out.push_row(result_row(
                        Status::Mismatched,
                        key,
                        Some(hub_totals),
                        Some(vendor_totals),
                        deltas.iter().join("; "),
                        high_field.is_some(),
                    ));
                    summary.mismatched += 1;
                }
                summary.keys_reported += 1;
            }
        }
    }

    for (key, vendor_totals) in &vendor_index.groups {
        if hub_index.groups.contains_key(key) {
            continue;
        }
        if settings.hide_missing {
            log::debug!("hiding vendor-only key {key}");
            summary.keys_skipped += 1;
        } else {
            out.push_row(result_row(
                Status::MissingInHub,
                key,
                None,
                Some(vendor_totals),
                String::new(),
                false,
            ));
            summary.missing_in_hub += 1;
            summary.keys_reported += 1;
        }
    }

    // tenant-excluded keys stay visible as data-error rows
    let mut excluded_keys: BTreeSet<BusinessKey> = hub_index
        .excluded
        .union(&vendor_index.excluded)
        .cloned()
        .collect();
    excluded_keys.retain(|key| {
        !hub_index.groups.contains_key(key) && !vendor_index.groups.contains_key(key)
    });
    for key in &excluded_keys {
        out.push_row(result_row(
            Status::DataError,
            key,
            None,
            None,
            "Excluded tenant".to_string(),
            false,
        ));
        summary.data_errors += 1;
        summary.keys_skipped += 1;
    }

    summary.keys_total = hub_index.groups.len()
        + vendor_index
            .groups
            .keys()
            .filter(|key| !hub_index.groups.contains_key(*key))
            .count()
        + excluded_keys.len();
    summary.duplicate_keys = count_duplicates(&hub_index, &vendor_index);

    log::info!("{summary}");
    ReconcileOutcome {
        table: out,
        summary,
    }
}

fn count_duplicates(hub: &SideIndex, vendor: &SideIndex) -> usize {
    let mut keys: BTreeSet<&BusinessKey> = BTreeSet::new();
    for (key, totals) in &hub.groups {
        if totals.rows > 1 {
            keys.insert(key);
        }
    }
    for (key, totals) in &vendor.groups {
        if totals.rows > 1 {
            keys.insert(key);
        }
    }
    keys.len()
}

fn result_columns(key_columns: &[String]) -> Vec<String> {
    let mut columns = vec!["Status".to_string()];
    columns.extend(key_columns.iter().cloned());
    for side in ["Hub", "Vendor"] {
        for field in ["Quantity", "Subtotal", "TaxTotal", "Total", "UnitPrice"] {
            columns.push(format!("{side}{field}"));
        }
    }
    columns.push("Detail".to_string());
    columns.push("Priority".to_string());
    columns
}

fn side_cells(totals: Option<&GroupTotals>) -> Vec<String> {
    match totals {
        Some(totals) => vec![
            totals.quantity.to_string(),
            totals.subtotal.to_string(),
            totals.tax_total.to_string(),
            totals.total.to_string(),
            totals.unit_price().to_string(),
        ],
        None => vec!["0".to_string(); 5],
    }
}

fn result_row(
    status: Status,
    key: &BusinessKey,
    hub: Option<&GroupTotals>,
    vendor: Option<&GroupTotals>,
    detail: String,
    high: bool,
) -> Vec<String> {
    let mut row = vec![status.to_string()];
    row.extend(key.components().iter().cloned());
    row.extend(side_cells(hub));
    row.extend(side_cells(vendor));
    row.push(detail);
    row.push(if high { "high".to_string() } else { String::new() });
    row
}

fn data_error_row(
    table: &Table,
    row: usize,
    key_columns: &[String],
    blank_column: &str,
    hub_side: bool,
) -> Vec<String> {
    let mut totals = GroupTotals::default();
    totals.absorb(table, row);
    let mut cells = vec![Status::DataError.to_string()];
    for column in key_columns {
        cells.push(table.cell(row, column).unwrap_or("").to_string());
    }
    if hub_side {
        cells.extend(side_cells(Some(&totals)));
        cells.extend(side_cells(None));
    } else {
        cells.extend(side_cells(None));
        cells.extend(side_cells(Some(&totals)));
    }
    cells.push(format!("Blank {blank_column}"));
    cells.push(String::new());
    cells
}

fn signed(delta: Decimal) -> String {
    let normalized = delta.normalize();
    if normalized.is_sign_negative() {
        normalized.to_string()
    } else {
        format!("+{normalized}")
    }
}
