//! Runtime settings document. Every field carries a default so the toolkit
//! runs without any configuration file present.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::schema;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Absolute difference treated as equal by the field-level detector.
    pub numeric_tolerance: f64,
    /// Calendar-day slack allowed between date fields.
    pub date_tolerance_days: i64,
    /// Maximum edit distance for fuzzy text and header matching.
    pub fuzzy_distance: usize,
    /// Blank cells tolerated per guarded column before the dataset guard fires.
    pub blank_field_threshold: usize,
    /// Detailed display entries kept per distinct finding before summarization.
    pub log_max_detail_rows: usize,
    /// Aggregated money difference tolerated by the reconciliation engine.
    pub amount_tolerance: f64,
    /// Aggregated quantity difference tolerated by the reconciliation engine.
    pub quantity_tolerance: f64,
    /// Absolute aggregated delta that marks a mismatch as high priority.
    pub high_priority_delta: f64,
    /// Canonical columns forming the business key.
    pub key_columns: Vec<String>,
    /// Key columns applied when strict keying is requested.
    pub strict_key_columns: Vec<String>,
    /// Optional mapping document; the builtin tables apply when unset.
    pub mapping_path: Option<PathBuf>,
    /// Customer identifiers dropped from aggregation.
    pub excluded_tenants: Vec<String>,
    /// Category excluded from the price check.
    pub excluded_category: String,
    /// Suppress vendor-only keys in reconciliation output.
    pub hide_missing: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            numeric_tolerance: 0.01,
            date_tolerance_days: 0,
            fuzzy_distance: 2,
            blank_field_threshold: 25,
            log_max_detail_rows: 10,
            amount_tolerance: 0.01,
            quantity_tolerance: 0.01,
            high_priority_delta: 100.0,
            key_columns: to_strings(schema::DEFAULT_KEY_COLUMNS),
            strict_key_columns: to_strings(schema::STRICT_KEY_COLUMNS),
            mapping_path: None,
            excluded_tenants: Vec::new(),
            excluded_category: "Usage".to_string(),
            hide_missing: false,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open settings '{}'", path.display()))?;
        let reader = BufReader::new(file);
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let settings = match extension.as_str() {
            "json" => serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse settings '{}'", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_reader(reader)
                .with_context(|| format!("Failed to parse settings '{}'", path.display()))?,
            other => bail!(
                "Unsupported settings extension '{other}' for '{}'; expected json, yaml, or yml",
                path.display()
            ),
        };
        Ok(settings)
    }

    /// Loads `path` when given, falls back to defaults otherwise. A path
    /// that exists but fails to parse is a hard error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn key_columns_for(&self, strict: bool) -> &[String] {
        if strict {
            &self.strict_key_columns
        } else {
            &self.key_columns
        }
    }

    pub fn numeric_tolerance_decimal(&self) -> Decimal {
        decimal_from(self.numeric_tolerance)
    }

    pub fn amount_tolerance_decimal(&self) -> Decimal {
        decimal_from(self.amount_tolerance)
    }

    pub fn quantity_tolerance_decimal(&self) -> Decimal {
        decimal_from(self.quantity_tolerance)
    }

    pub fn high_priority_delta_decimal(&self) -> Decimal {
        decimal_from(self.high_priority_delta)
    }
}

fn to_strings(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|column| column.to_string()).collect()
}

fn decimal_from(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}
