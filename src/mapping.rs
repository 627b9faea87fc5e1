//! Source families and the mapping layer that projects raw exports onto
//! the canonical schema. Each family carries a table of per-column rules:
//! a plain alias, an ordered fallback list, or an arithmetic expression.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::expr::Expr;
use crate::fuzzy;
use crate::issues::{Issue, IssueSink};
use crate::schema;
use crate::table::Table;
use crate::value;

/// Faults that abort the run, as opposed to findings that are logged.
#[derive(Debug, Error)]
pub enum Fault {
    #[error(
        "Cannot infer a source family from '{file_name}'; expected the file name to start with 'hub', 'invoice', or 'recon'"
    )]
    UnknownSourceFamily { file_name: String },

    #[error("Mapping document defines no table for source family '{family}'")]
    MissingFamilyMapping { family: SourceFamily },

    #[error("Required column '{column}' could not be resolved in '{source_name}'{hint}")]
    RequiredColumnMissing {
        column: String,
        source_name: String,
        hint: String,
    },
}

impl Fault {
    pub fn required_column_missing(column: &str, source: &str, closest: Option<String>) -> Self {
        let hint = closest
            .map(|name| format!("; closest header is '{name}'"))
            .unwrap_or_default();
        Fault::RequiredColumnMissing {
            column: column.to_string(),
            source_name: source.to_string(),
            hint,
        }
    }
}

/// The three recognized export lineages, inferred from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceFamily {
    Hub,
    VendorInvoice,
    VendorRecon,
}

impl SourceFamily {
    pub const ALL: &'static [SourceFamily] = &[
        SourceFamily::Hub,
        SourceFamily::VendorInvoice,
        SourceFamily::VendorRecon,
    ];

    pub fn detect(file_name: &str) -> Option<SourceFamily> {
        let lowered = file_name.to_lowercase();
        if lowered.starts_with("hub") {
            Some(SourceFamily::Hub)
        } else if lowered.starts_with("invoice") {
            Some(SourceFamily::VendorInvoice)
        } else if lowered.starts_with("recon") {
            Some(SourceFamily::VendorRecon)
        } else {
            None
        }
    }

    pub fn from_tag(tag: &str) -> Option<SourceFamily> {
        match tag.trim().to_lowercase().as_str() {
            "hub" => Some(SourceFamily::Hub),
            "invoice" => Some(SourceFamily::VendorInvoice),
            "recon" => Some(SourceFamily::VendorRecon),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            SourceFamily::Hub => "hub",
            SourceFamily::VendorInvoice => "invoice",
            SourceFamily::VendorRecon => "recon",
        }
    }
}

impl fmt::Display for SourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone)]
pub enum MappingRule {
    /// Copy one source column.
    Alias(String),
    /// First non-blank cell among the listed source columns.
    Fallback(Vec<String>),
    /// Arithmetic over source columns, rendered as canonical decimal text.
    Compute(Expr),
}

impl MappingRule {
    fn alias(source: &str) -> MappingRule {
        MappingRule::Alias(source.to_string())
    }

    fn fallback(sources: &[&str]) -> MappingRule {
        MappingRule::Fallback(sources.iter().map(|source| source.to_string()).collect())
    }
}

/// Document form of a rule: a bare string or an array of source columns
/// (optionally terminated by `"*"` for product forms).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RuleSpec {
    One(String),
    Many(Vec<String>),
}

fn compile_rule(spec: RuleSpec) -> Result<MappingRule> {
    match spec {
        RuleSpec::One(text) => {
            let text = text.trim().to_string();
            if text.is_empty() {
                bail!("Mapping rule is empty");
            }
            if text.contains('{') {
                Ok(MappingRule::Compute(Expr::parse(&text)?))
            } else {
                Ok(MappingRule::Alias(text))
            }
        }
        RuleSpec::Many(items) => {
            let items: Vec<String> = items
                .into_iter()
                .map(|item| item.trim().to_string())
                .collect();
            if items.iter().any(String::is_empty) {
                bail!("Mapping rule arrays cannot contain empty entries");
            }
            match items.last().map(String::as_str) {
                Some("*") => match items.len() {
                    3 => Ok(MappingRule::Compute(Expr::product(&items[0], &items[1]))),
                    4 => Ok(MappingRule::Compute(Expr::product_plus(
                        &items[0], &items[1], &items[2],
                    ))),
                    _ => bail!("A '*' mapping rule takes two or three source columns"),
                },
                Some(_) if items.len() == 1 => Ok(MappingRule::Alias(items[0].clone())),
                Some(_) => Ok(MappingRule::Fallback(items)),
                None => bail!("Mapping rule array is empty"),
            }
        }
    }
}

/// Per-family rule table. Canonical columns without a rule fall back to a
/// same-name alias.
#[derive(Debug, Clone, Default)]
pub struct MappingSet {
    rules: BTreeMap<String, MappingRule>,
}

impl MappingSet {
    fn insert(&mut self, canonical: &str, rule: MappingRule) {
        self.rules.insert(canonical.to_string(), rule);
    }

    pub fn rule(&self, canonical: &str) -> Option<&MappingRule> {
        self.rules.get(canonical)
    }
}

#[derive(Debug, Clone)]
pub struct MappingDocument {
    tables: BTreeMap<SourceFamily, MappingSet>,
}

impl MappingDocument {
    /// Builtin tables for the three families; used whenever no mapping
    /// document is configured.
    pub fn builtin() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(SourceFamily::Hub, MappingSet::default());
        tables.insert(SourceFamily::VendorInvoice, builtin_invoice());
        tables.insert(SourceFamily::VendorRecon, builtin_recon());
        MappingDocument { tables }
    }

    /// Parses a JSON or YAML mapping document. A provided document replaces
    /// the builtin tables entirely.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open mapping document '{}'", path.display()))?;
        let reader = BufReader::new(file);
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let raw: BTreeMap<String, BTreeMap<String, RuleSpec>> = match extension.as_str() {
            "json" => serde_json::from_reader(reader).with_context(|| {
                format!("Failed to parse mapping document '{}'", path.display())
            })?,
            "yaml" | "yml" => serde_yaml::from_reader(reader).with_context(|| {
                format!("Failed to parse mapping document '{}'", path.display())
            })?,
            other => bail!(
                "Unsupported mapping extension '{other}' for '{}'; expected json, yaml, or yml",
                path.display()
            ),
        };

        let mut tables = BTreeMap::new();
        for (family_tag, columns) in raw {
            let Some(family) = SourceFamily::from_tag(&family_tag) else {
                bail!(
                    "Unknown source family '{family_tag}' in '{}'; expected hub, invoice, or recon",
                    path.display()
                );
            };
            let mut set = MappingSet::default();
            for (column_name, spec) in columns {
                let Some(canonical) = schema::canonical_name(&column_name) else {
                    bail!(
                        "Unknown canonical column '{column_name}' in mapping for family '{family}'"
                    );
                };
                let rule = compile_rule(spec).with_context(|| {
                    format!("Invalid mapping rule for '{canonical}' in family '{family}'")
                })?;
                set.insert(canonical, rule);
            }
            tables.insert(family, set);
        }
        Ok(MappingDocument { tables })
    }

    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn set_for(&self, family: SourceFamily) -> Result<&MappingSet, Fault> {
        self.tables
            .get(&family)
            .ok_or(Fault::MissingFamilyMapping { family })
    }
}

fn builtin_invoice() -> MappingSet {
    let mut set = MappingSet::default();
    set.insert(
        "CustomerName",
        MappingRule::fallback(&["CustomerCompanyName", "CustomerName"]),
    );
    set.insert(
        "CustomerId",
        MappingRule::fallback(&["CustomerTenantId", "CustomerId"]),
    );
    set.insert("PartnerId", MappingRule::fallback(&["PartnerId", "MpnId"]));
    set.insert(
        "SubscriptionId",
        MappingRule::fallback(&["SubscriptionId", "SubscriptionGuid"]),
    );
    set.insert(
        "ProductId",
        MappingRule::fallback(&["ProductId", "OfferId", "Sku"]),
    );
    set.insert(
        "ProductName",
        MappingRule::fallback(&["ProductName", "OfferName", "SkuName"]),
    );
    set.insert(
        "Category",
        MappingRule::fallback(&["Category", "MeterCategory"]),
    );
    set.insert(
        "ChargeStartDate",
        MappingRule::fallback(&["ChargeStartDate", "UsageDate"]),
    );
    set.insert(
        "Quantity",
        MappingRule::fallback(&["Quantity", "BillableQuantity"]),
    );
    set.insert(
        "UnitPrice",
        MappingRule::fallback(&["UnitPrice", "EffectiveUnitPrice"]),
    );
    set.insert(
        "Subtotal",
        MappingRule::fallback(&["Subtotal", "PreTaxTotal", "Amount"]),
    );
    set.insert(
        "TaxTotal",
        MappingRule::fallback(&["TaxTotal", "Tax", "TaxAmount"]),
    );
    set.insert(
        "Total",
        MappingRule::fallback(&["Total", "PostTaxTotal", "GrandTotal"]),
    );
    set
}

fn builtin_recon() -> MappingSet {
    let mut set = MappingSet::default();
    set.insert(
        "CustomerName",
        MappingRule::fallback(&["CustomerName", "CustomerCompanyName"]),
    );
    set.insert(
        "CustomerId",
        MappingRule::fallback(&["CustomerId", "CustomerTenantId", "TenantId"]),
    );
    set.insert("PartnerId", MappingRule::fallback(&["PartnerId", "MpnId"]));
    set.insert(
        "SubscriptionId",
        MappingRule::fallback(&["SubscriptionId", "SubscriptionGuid"]),
    );
    set.insert(
        "ProductId",
        MappingRule::fallback(&["ProductId", "Sku", "OfferId"]),
    );
    set.insert(
        "ProductName",
        MappingRule::fallback(&["ProductName", "SkuName"]),
    );
    set.insert(
        "Category",
        MappingRule::fallback(&["Category", "MeterCategory"]),
    );
    set.insert(
        "ChargeStartDate",
        MappingRule::fallback(&["ChargeStartDate", "UsageDate"]),
    );
    set.insert(
        "Quantity",
        MappingRule::fallback(&["BillableQuantity", "Quantity"]),
    );
    set.insert(
        "UnitPrice",
        MappingRule::fallback(&["EffectiveUnitPrice", "UnitPrice"]),
    );
    set.insert(
        "Subtotal",
        MappingRule::Compute(Expr::product("EffectiveUnitPrice", "BillableQuantity")),
    );
    set.insert("TaxTotal", MappingRule::alias("Tax"));
    set.insert(
        "Total",
        MappingRule::Compute(Expr::product_plus(
            "EffectiveUnitPrice",
            "BillableQuantity",
            "Tax",
        )),
    );
    set
}

enum Resolved {
    /// Concrete source columns; the first non-blank cell wins.
    Cells(Vec<usize>),
    /// Expression with its references resolved to source columns.
    Compute(Expr, HashMap<String, Option<usize>>),
    /// No source column available; cells stay blank.
    Blank,
}

/// Projects `table` onto the canonical schema using the family's rules.
/// Source references resolve exactly first, then by fuzzy match within
/// `fuzzy_distance` (logged). A required canonical column that resolves to
/// nothing is a fatal fault.
pub fn apply(
    table: &Table,
    family: SourceFamily,
    document: &MappingDocument,
    required: &[String],
    fuzzy_distance: usize,
    sink: &dyn IssueSink,
) -> Result<Table> {
    let set = document.set_for(family)?;
    let headers = table.columns();

    let mut plan: Vec<Resolved> = Vec::new();
    for &canonical in schema::CANONICAL_COLUMNS {
        let rule = set
            .rule(canonical)
            .cloned()
            .unwrap_or_else(|| MappingRule::Alias(canonical.to_string()));
        let resolved = match rule {
            MappingRule::Alias(source) => {
                match resolve_column(table, &source, fuzzy_distance, sink) {
                    Some(index) => Resolved::Cells(vec![index]),
                    None => Resolved::Blank,
                }
            }
            MappingRule::Fallback(sources) => {
                let indexes: Vec<usize> = sources
                    .iter()
                    .filter_map(|source| resolve_column(table, source, fuzzy_distance, sink))
                    .collect();
                if indexes.is_empty() {
                    Resolved::Blank
                } else {
                    Resolved::Cells(indexes)
                }
            }
            MappingRule::Compute(expr) => {
                let references: HashMap<String, Option<usize>> = expr
                    .references()
                    .iter()
                    .map(|name| {
                        (
                            (*name).to_string(),
                            resolve_column(table, name, fuzzy_distance, sink),
                        )
                    })
                    .collect();
                Resolved::Compute(expr, references)
            }
        };
        if matches!(resolved, Resolved::Blank) && required.iter().any(|name| name == canonical) {
            let closest =
                fuzzy::find_closest(canonical, headers.iter().map(String::as_str), usize::MAX)
                    .map(|(index, _)| headers[index].clone());
            return Err(Fault::required_column_missing(canonical, table.name(), closest).into());
        }
        plan.push(resolved);
    }

    let mut canonical_table = Table::new(
        table.name().to_string(),
        schema::CANONICAL_COLUMNS
            .iter()
            .map(|column| column.to_string())
            .collect(),
    );
    for row_index in 0..table.row_count() {
        let mut row = Vec::with_capacity(plan.len());
        for resolved in &plan {
            let cell = match resolved {
                Resolved::Blank => String::new(),
                Resolved::Cells(indexes) => indexes
                    .iter()
                    .find_map(|&index| {
                        let text = table.cell_at(row_index, index).unwrap_or("");
                        if text.is_empty() {
                            None
                        } else {
                            Some(text.to_string())
                        }
                    })
                    .unwrap_or_default(),
                Resolved::Compute(expr, references) => {
                    let resolve = |name: &str| -> Option<Decimal> {
                        let index = references.get(name).copied().flatten()?;
                        let text = table.cell_at(row_index, index)?;
                        value::parse_decimal(text)
                    };
                    expr.evaluate(&resolve).to_string()
                }
            };
            row.push(cell);
        }
        canonical_table.push_row(row);
    }
    Ok(canonical_table)
}

fn resolve_column(
    table: &Table,
    source: &str,
    fuzzy_distance: usize,
    sink: &dyn IssueSink,
) -> Option<usize> {
    if let Some(index) = table.column_index(source) {
        return Some(index);
    }
    let headers = table.columns();
    let (index, distance) =
        fuzzy::find_closest(source, headers.iter().map(String::as_str), fuzzy_distance)?;
    sink.record(
        Issue::warning(
            source,
            format!(
                "Resolved by fuzzy match to source column '{}' (distance {distance})",
                headers[index]
            ),
        )
        .with_source(table.name()),
    );
    Some(index)
}
