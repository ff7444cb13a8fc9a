//! Best-effort cell conversions.
//!
//! Every function here returns `None` for input it cannot interpret. A `None`
//! is written as an empty cell and counted as a missing value; it never
//! rejects the surrounding row.

use chrono::NaiveDate;
use serde_json::Value;

/// Tokens a reader of the output files treats as "not available".
pub const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Parse a plain decimal number. Non-finite results count as missing.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a number written with a comma decimal separator and space
/// thousands separators, e.g. `"1 234,56"`.
///
/// Values already in canonical form (`"1234.56"`) pass through unchanged.
pub fn parse_locale_number(text: &str) -> Option<f64> {
    let normalized: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    parse_number(&normalized)
}

/// Numeric value of a JSON scalar: numbers as-is, numeric strings parsed.
pub fn number_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Text form of a JSON scalar; `null` and containers are missing.
pub fn text_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a `dd/mm/yyyy` date.
pub fn parse_day_month_year(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%d/%m/%Y").ok()
}

/// Round to 2 decimals; `None` when the result is not finite.
pub fn round2(value: f64) -> Option<f64> {
    Some((value * 100.0).round() / 100.0).filter(|v| v.is_finite())
}

/// Render an optional number as a CSV cell.
pub fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn is_missing_cell(cell: &str) -> bool {
    let trimmed = cell.trim();
    MISSING_TOKENS.contains(&trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_locale_number_with_thousands_and_comma() {
        assert_eq!(parse_locale_number("1 234,56"), Some(1234.56));
        assert_eq!(parse_locale_number("\u{a0}98,7 "), Some(98.7));
        assert_eq!(parse_locale_number("12\u{202f}000"), Some(12000.0));
    }

    #[test]
    fn test_locale_number_rejects_text() {
        assert_eq!(parse_locale_number("Alimentation"), None);
        assert_eq!(parse_locale_number(""), None);
        assert_eq!(parse_locale_number("-"), None);
        assert_eq!(parse_locale_number("NaN"), None);
        assert_eq!(parse_locale_number("inf"), None);
    }

    #[test]
    fn test_locale_number_is_noop_on_canonical_values() {
        for value in [1234.56_f64, 0.0, -3.5, 100.0, 0.01] {
            let rendered = format_number(Some(value));
            assert_eq!(parse_locale_number(&rendered), Some(value));
            assert_eq!(parse_locale_number(&format_number(parse_locale_number(&rendered))), Some(value));
        }
    }

    #[test]
    fn test_number_from_json() {
        assert_eq!(number_from_json(&json!(12.5)), Some(12.5));
        assert_eq!(number_from_json(&json!("42")), Some(42.0));
        assert_eq!(number_from_json(&json!("n/a")), None);
        assert_eq!(number_from_json(&json!(null)), None);
        assert_eq!(number_from_json(&json!([1])), None);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.3456), Some(12.35));
        assert_eq!(round2(7.0), Some(7.0));
        // scaling by 100 overflows
        assert_eq!(round2(1.0e307), None);
        assert_eq!(round2(-f64::MAX), None);
    }

    #[test]
    fn test_day_month_year() {
        assert_eq!(
            parse_day_month_year("10/01/2026"),
            NaiveDate::from_ymd_opt(2026, 1, 10)
        );
        assert_eq!(parse_day_month_year("31/02/2026"), None);
        assert_eq!(parse_day_month_year("2026/01/10"), None);
    }

    #[test]
    fn test_missing_cells() {
        assert!(is_missing_cell(""));
        assert!(is_missing_cell("  "));
        assert!(is_missing_cell("NaN"));
        assert!(!is_missing_cell("0"));
    }
}
