//! Value coercion: smart numeric/date parsing, loose equality, and the
//! three-tier ordering used by every comparison operator and by sorting.
//!
//! Parsing never errors; `None` is the "not a number" / "not a date" signal.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::table::is_null_like;

/// Date-only formats tried after RFC 3339: invariant first, then the two
/// supported locale families (day-first, then US month-first).
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%m/%d/%Y"];

/// Datetime formats tried with the same locale ladder.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Render any value as text for comparison and concatenation. Null renders
/// empty; objects and arrays fall back to their JSON encoding.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Smart numeric parse. Native numbers pass through; text goes through an
/// invariant parse, two locale interpretations, and finally a heuristic that
/// treats the last `,` or `.` as the decimal separator and everything else
/// as grouping.
pub fn smart_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number_text(s),
        _ => None,
    }
}

fn parse_number_text(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    // Invariant: plain dot-decimal, no grouping.
    if let Ok(n) = t.parse::<f64>() {
        return Some(n);
    }
    // Comma-decimal locale without grouping: "100,50".
    if !t.contains('.') && t.matches(',').count() == 1 {
        if let Ok(n) = t.replace(',', ".").parse::<f64>() {
            return Some(n);
        }
    }
    // Comma-decimal locale with dot grouping: "1.234,56".
    if t.contains('.') && t.contains(',') {
        if let Some(last_comma) = t.rfind(',') {
            if t.rfind('.').map(|d| d < last_comma).unwrap_or(false) {
                if let Ok(n) = t.replace('.', "").replace(',', ".").parse::<f64>() {
                    return Some(n);
                }
            }
        }
    }
    // Heuristic: the last separator is the decimal point, all other
    // separators (grouping dots, commas, spaces, apostrophes) are stripped.
    let decimal_at = t.rfind(|c| c == ',' || c == '.');
    let mut normalized = String::with_capacity(t.len());
    for (i, c) in t.char_indices() {
        match c {
            ',' | '.' => {
                if Some(i) == decimal_at {
                    normalized.push('.');
                }
            }
            ' ' | '\u{a0}' | '\'' => {}
            _ => normalized.push(c),
        }
    }
    normalized.parse::<f64>().ok()
}

/// Smart date parse. Tries RFC 3339, then the invariant and locale format
/// ladders, then interprets a bare 4-digit integer as January 1 of that
/// year. Null-like values (including the sentinel date strings) never parse.
pub fn smart_date(value: &Value) -> Option<NaiveDateTime> {
    if is_null_like(value) {
        return None;
    }
    match value {
        Value::String(s) => parse_date_text(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .filter(|y| (1000..=9999).contains(y))
            .and_then(|y| NaiveDate::from_ymd_opt(y as i32, 1, 1))
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    // A bare 4-digit year means January 1 of that year.
    if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = text.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    }
    None
}

/// Loose equality: null-like equals null-like; numeric when both sides parse
/// as numbers; case-insensitive text otherwise.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    let a_null = is_null_like(a);
    let b_null = is_null_like(b);
    if a_null || b_null {
        return a_null == b_null;
    }
    if let (Some(x), Some(y)) = (smart_number(a), smart_number(b)) {
        return x == y;
    }
    to_text(a).eq_ignore_ascii_case(&to_text(b))
}

/// Three-tier ordering: numeric if both parse as numbers, else date if both
/// parse as dates, else case-insensitive text.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (smart_number(a), smart_number(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    if let (Some(x), Some(y)) = (smart_date(a), smart_date(b)) {
        return x.cmp(&y);
    }
    to_text(a).to_lowercase().cmp(&to_text(b).to_lowercase())
}

/// Truthiness used by `$isTrue`/`$isFalse`: JSON true, non-zero numbers, and
/// the affirmative text values `"true"`, `"1"`, `"yes"`, `"ja"`.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => {
            let t = s.trim().to_lowercase();
            matches!(t.as_str(), "true" | "1" | "yes" | "ja")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invariant_and_locale_numbers_agree() {
        assert_eq!(smart_number(&json!("1234.56")), Some(1234.56));
        assert_eq!(smart_number(&json!("1.234,56")), Some(1234.56));
        assert_eq!(smart_number(&json!("1,234.56")), Some(1234.56));
        assert_eq!(smart_number(&json!("100,50")), Some(100.50));
        assert_eq!(smart_number(&json!("1 234,56")), Some(1234.56));
        assert_eq!(smart_number(&json!(42)), Some(42.0));
        assert_eq!(smart_number(&json!("abc")), None);
        assert_eq!(smart_number(&json!("")), None);
    }

    #[test]
    fn test_date_parsing_ladder() {
        assert!(smart_date(&json!("2024-03-01")).is_some());
        assert!(smart_date(&json!("2024-03-01T10:30:00Z")).is_some());
        assert!(smart_date(&json!("01/03/2024")).is_some());
        assert!(smart_date(&json!("2024")).is_some());
        assert_eq!(
            smart_date(&json!("2024")).unwrap().date(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert!(smart_date(&json!("0000-00-00")).is_none());
        assert!(smart_date(&json!("not a date")).is_none());
    }

    #[test]
    fn test_loose_equality() {
        assert!(loose_eq(&json!(null), &json!("")));
        assert!(loose_eq(&json!("  "), &json!("0000-00-00")));
        assert!(!loose_eq(&json!(null), &json!("x")));
        assert!(loose_eq(&json!("100,50"), &json!(100.5)));
        assert!(loose_eq(&json!("Widget"), &json!("WIDGET")));
        assert!(!loose_eq(&json!("widget"), &json!("gadget")));
    }

    #[test]
    fn test_three_tier_compare() {
        assert_eq!(compare_values(&json!("9"), &json!("10")), Ordering::Less);
        assert_eq!(
            compare_values(&json!("2024-01-02"), &json!("2024-01-10")),
            Ordering::Less
        );
        // Mixed types fall through to case-insensitive text.
        assert_eq!(compare_values(&json!("Apple"), &json!("apple")), Ordering::Equal);
        assert_eq!(compare_values(&json!("apple"), &json!("Banana")), Ordering::Less);
    }

    #[test]
    fn test_truthy_text() {
        assert!(truthy(&json!("yes")));
        assert!(truthy(&json!("JA")));
        assert!(truthy(&json!("1")));
        assert!(truthy(&json!(true)));
        assert!(!truthy(&json!("no")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(null)));
    }
}
