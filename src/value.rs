//! Locale-invariant parsing for the two typed cell shapes the pipeline
//! understands: decimal amounts and calendar dates.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;

static NUMERIC_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.\-]+").expect("NUMERIC_NOISE is a valid regex pattern"));

/// Date layouts accepted on input, tried in order. ISO layouts come first;
/// for ambiguous slashed dates the month-first reading wins.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(parsed.date());
        }
    }
    None
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Strips currency symbols, thousands separators, and surrounding noise,
/// keeping digits, decimal points, and minus signs.
pub fn sanitize_numeric(value: &str) -> String {
    NUMERIC_NOISE.replace_all(value.trim(), "").into_owned()
}

pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let mut cleaned = sanitize_numeric(value);
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    if let Some(rest) = cleaned.strip_prefix('.') {
        cleaned = format!("0.{rest}");
    } else if let Some(rest) = cleaned.strip_prefix("-.") {
        cleaned = format!("-0.{rest}");
    }
    cleaned.parse::<Decimal>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_date("2024-05-06"), Some(expected));
        assert_eq!(parse_date("2024/05/06"), Some(expected));
        assert_eq!(parse_date("05/06/2024"), Some(expected));
        assert_eq!(parse_date("05-06-2024"), Some(expected));
    }

    #[test]
    fn parse_date_accepts_datetime_inputs() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_date("2024-05-06T14:30:00"), Some(expected));
        assert_eq!(parse_date("2024-05-06 14:30:00.123"), Some(expected));
        assert_eq!(parse_date("05/06/2024 14:30"), Some(expected));
    }

    #[test]
    fn parse_date_rejects_junk() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-13-40"), None);
    }

    #[test]
    fn parse_decimal_strips_currency_noise() {
        assert_eq!(parse_decimal("$1,234.50"), Some(Decimal::new(123450, 2)));
        assert_eq!(parse_decimal(" 12 USD "), Some(Decimal::new(12, 0)));
        assert_eq!(parse_decimal("5%"), Some(Decimal::new(5, 0)));
        assert_eq!(parse_decimal("-7.25"), Some(Decimal::new(-725, 2)));
    }

    #[test]
    fn parse_decimal_handles_bare_fractions() {
        assert_eq!(parse_decimal(".5"), Some(Decimal::new(5, 1)));
        assert_eq!(parse_decimal("-.5"), Some(Decimal::new(-5, 1)));
    }

    #[test]
    fn parse_decimal_rejects_unusable_text() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("   "), None);
        assert_eq!(parse_decimal("N/A"), None);
        assert_eq!(parse_decimal("1.2.3"), None);
        assert_eq!(parse_decimal("1-2"), None);
    }

    #[test]
    fn canonical_decimal_text_is_stable() {
        let parsed = parse_decimal("1,234.50").unwrap();
        assert_eq!(parsed.to_string(), "1234.50");
        assert_eq!(parse_decimal("1234.50"), Some(parsed));
    }
}
