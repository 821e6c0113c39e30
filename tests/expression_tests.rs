//! Scalar expression operator tests
//!
//! Comprehensive tests for the compute-stage expression grammar:
//! - String operators ($toLower, $concat, $substr, $regex)
//! - Coercion operators ($toNumber, $toDate)
//! - Arithmetic ($add, $sub, $mul, $divide, $abs) and $dateDiffDays
//! - Literal vs column-reference resolution for bare strings

use serde_json::json;

mod common;
use common::{run, table};

fn one(value: serde_json::Value) -> tabql::Table {
    table(vec![value])
}

fn compute(row: serde_json::Value, expr: serde_json::Value) -> serde_json::Value {
    let t = one(row);
    let results = run(&t, json!({"compute": {"out": expr}}));
    results[0]["out"].clone()
}

// ============================================================================
// Bare Strings: Column Reference or Literal
// ============================================================================

#[test]
fn test_bare_string_resolves_column_when_present() {
    assert_eq!(compute(json!({"name": "Alice"}), json!("name")), json!("Alice"));
}

#[test]
fn test_bare_string_is_literal_when_column_missing() {
    assert_eq!(compute(json!({"name": "Alice"}), json!("label")), json!("label"));
}

#[test]
fn test_column_lookup_is_case_insensitive() {
    assert_eq!(compute(json!({"Name": "Alice"}), json!("name")), json!("Alice"));
}

// ============================================================================
// String Operators
// ============================================================================

#[test]
fn test_to_lower() {
    assert_eq!(
        compute(json!({"city": "AMSTERDAM"}), json!({"$toLower": "city"})),
        json!("amsterdam")
    );
}

#[test]
fn test_concat_renders_null_as_empty() {
    assert_eq!(
        compute(
            json!({"a": "x", "b": null}),
            json!({"$concat": ["a", "-", "b", {"$toLower": "Y"}]})
        ),
        json!("x-y")
    );
}

#[test]
fn test_substr_clamps_to_string_bounds() {
    let row = json!({"s": "hello"});
    assert_eq!(compute(row.clone(), json!({"$substr": ["s", 1, 3]})), json!("ell"));
    assert_eq!(compute(row.clone(), json!({"$substr": ["s", 1]})), json!("ello"));
    assert_eq!(compute(row.clone(), json!({"$substr": ["s", 3, 10]})), json!("lo"));
    assert_eq!(compute(row, json!({"$substr": ["s", 99, 2]})), json!(""));
}

#[test]
fn test_regex_expression_returns_bool() {
    let row = json!({"s": "Hello World"});
    assert_eq!(
        compute(row.clone(), json!({"$regex": ["s", "^Hello"]})),
        json!(true)
    );
    assert_eq!(
        compute(row.clone(), json!({"$regex": ["s", "^hello"]})),
        json!(false)
    );
    assert_eq!(
        compute(row.clone(), json!({"$regexi": ["s", "^hello"]})),
        json!(true)
    );
    assert_eq!(
        compute(row, json!({"$regex": ["s", "^hello"], "$options": "i"})),
        json!(true)
    );
}

// ============================================================================
// Coercion Operators
// ============================================================================

#[test]
fn test_to_number_uses_smart_parsing() {
    assert_eq!(compute(json!({"v": "1.234,56"}), json!({"$toNumber": "v"})), json!(1234.56));
    assert_eq!(compute(json!({"v": "12"}), json!({"$toNumber": "v"})), json!(12));
    assert_eq!(compute(json!({"v": "abc"}), json!({"$toNumber": "v"})), json!(null));
}

#[test]
fn test_to_date_normalizes_formats() {
    assert_eq!(
        compute(json!({"d": "31/12/2023"}), json!({"$toDate": "d"})),
        json!("2023-12-31T00:00:00")
    );
    assert_eq!(
        compute(json!({"d": "2023"}), json!({"$toDate": "d"})),
        json!("2023-01-01T00:00:00")
    );
    assert_eq!(compute(json!({"d": "soon"}), json!({"$toDate": "d"})), json!(null));
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_arithmetic_folds_left_to_right() {
    let row = json!({"a": "10", "b": "4"});
    assert_eq!(compute(row.clone(), json!({"$add": ["a", "b", 1]})), json!(15));
    assert_eq!(compute(row.clone(), json!({"$sub": ["a", "b"]})), json!(6));
    assert_eq!(compute(row.clone(), json!({"$subtract": ["a", "b"]})), json!(6));
    assert_eq!(compute(row.clone(), json!({"$mul": ["a", "b"]})), json!(40));
    assert_eq!(compute(row, json!({"$divide": ["a", "b"]})), json!(2.5));
}

#[test]
fn test_division_by_zero_yields_null() {
    assert_eq!(
        compute(json!({"a": "10", "b": "0"}), json!({"$divide": ["a", "b"]})),
        json!(null)
    );
}

#[test]
fn test_non_numeric_operand_yields_null() {
    assert_eq!(
        compute(json!({"a": "10", "b": "oops"}), json!({"$add": ["a", "b"]})),
        json!(null)
    );
}

#[test]
fn test_abs() {
    assert_eq!(compute(json!({"v": "-3,5"}), json!({"$abs": "v"})), json!(3.5));
    assert_eq!(compute(json!({"v": "x"}), json!({"$abs": "v"})), json!(null));
}

#[test]
fn test_date_diff_days() {
    let row = json!({"from": "2024-01-01", "to": "2024-01-31"});
    assert_eq!(
        compute(row.clone(), json!({"$dateDiffDays": ["to", "from"]})),
        json!(30)
    );
    assert_eq!(
        compute(row, json!({"$dateDiffDays": ["from", "nope"]})),
        json!(null)
    );
}

// ============================================================================
// Permissiveness
// ============================================================================

#[test]
fn test_unknown_operator_evaluates_to_null() {
    assert_eq!(compute(json!({"a": 1}), json!({"$median": "a"})), json!(null));
}

#[test]
fn test_aggregate_operator_in_scalar_context_is_null() {
    assert_eq!(compute(json!({"a": 1}), json!({"$count": {}})), json!(null));
}

#[test]
fn test_plain_object_is_a_literal() {
    assert_eq!(
        compute(json!({"a": 1}), json!({"note": "kept as-is"})),
        json!({"note": "kept as-is"})
    );
}
