//! Canonical invoice schema: the fixed column vocabulary both feeds are
//! projected onto, plus the column-name heuristics shared by the
//! normalizer, validator, and mapper.

use heck::ToUpperCamelCase;

use crate::fuzzy;

pub const CANONICAL_COLUMNS: &[&str] = &[
    "CustomerName",
    "CustomerId",
    "PartnerId",
    "InvoiceNumber",
    "SubscriptionId",
    "ProductId",
    "ProductName",
    "Category",
    "ChargeType",
    "ChargeStartDate",
    "ChargeEndDate",
    "Quantity",
    "UnitPrice",
    "DiscountPercent",
    "Subtotal",
    "TaxTotal",
    "Total",
];

/// Columns whose cells are canonicalized to plain decimal text.
pub const NUMERIC_COLUMNS: &[&str] = &[
    "Quantity",
    "UnitPrice",
    "DiscountPercent",
    "Subtotal",
    "TaxTotal",
    "Total",
];

/// Pricing fields the row validator treats as critical.
pub const CRITICAL_PRICING_COLUMNS: &[&str] = &["UnitPrice", "Subtotal", "Total"];

/// Columns watched by the blank-count guard during validation.
pub const BLANK_GUARD_COLUMNS: &[&str] = &[
    "CustomerId",
    "ProductId",
    "Quantity",
    "UnitPrice",
    "Total",
];

/// Financial headers kept by older exports, renamed before aggregation.
pub const LEGACY_FINANCIAL_ALIASES: &[(&str, &str)] = &[
    ("PreTaxTotal", "Subtotal"),
    ("Tax", "TaxTotal"),
    ("TaxAmount", "TaxTotal"),
    ("GrandTotal", "Total"),
    ("PostTaxTotal", "Total"),
];

pub const DEFAULT_KEY_COLUMNS: &[&str] = &["CustomerId", "ProductId"];

pub const STRICT_KEY_COLUMNS: &[&str] =
    &["CustomerId", "ProductId", "SubscriptionId", "ChargeType"];

pub fn is_numeric_column(name: &str) -> bool {
    let normalized = fuzzy::normalize(name);
    NUMERIC_COLUMNS
        .iter()
        .any(|column| fuzzy::normalize(column) == normalized)
}

pub fn is_date_column(name: &str) -> bool {
    name.trim().to_lowercase().ends_with("date")
}

/// Identifier-like columns keep their text exactly, leading zeros included.
pub fn is_identifier_column(name: &str) -> bool {
    let normalized = fuzzy::normalize(name);
    normalized.ends_with("id")
        || normalized.ends_with("guid")
        || normalized.contains("sku")
        || normalized.contains("number")
        || normalized.contains("code")
}

/// Resolves a loosely cased or delimited name ("customer_id", "unit price")
/// to its canonical column.
pub fn canonical_name(name: &str) -> Option<&'static str> {
    let camel = name.to_upper_camel_case();
    if let Some(found) = CANONICAL_COLUMNS
        .iter()
        .copied()
        .find(|column| *column == camel)
    {
        return Some(found);
    }
    let normalized = fuzzy::normalize(name);
    CANONICAL_COLUMNS
        .iter()
        .copied()
        .find(|column| fuzzy::normalize(column) == normalized)
}
