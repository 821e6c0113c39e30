//! Predicate tree evaluation, shared by the pre-aggregate filter stage and
//! the post-aggregate having stage.
//!
//! Object properties are implicitly AND-ed; `$or`/`$and` take arrays of
//! sub-predicates and `$not` negates a nested predicate. Leaf values are
//! either a literal (implying `$eq`) or an operator object. Field references
//! resolve through the central row accessor, so `metrics.<alias>` and plain
//! aliases both work after aggregation.

use serde_json::Value;

use crate::coerce::{compare_values, loose_eq, to_text, truthy};
use crate::table::{field_value, get_field, is_null_like, is_null_like_opt, Row};

use super::utils::safe_regex;

/// Evaluate a predicate tree against one row. Non-object predicates and
/// unknown operators match permissively instead of failing the query.
pub fn matches(row: &Row, predicate: &Value) -> bool {
    let obj = match predicate {
        Value::Object(obj) => obj,
        _ => return true,
    };

    for (key, condition) in obj {
        let ok = match key.as_str() {
            "$or" => match condition {
                Value::Array(branches) => branches.iter().any(|p| matches(row, p)),
                _ => true,
            },
            "$and" => match condition {
                Value::Array(branches) => branches.iter().all(|p| matches(row, p)),
                _ => true,
            },
            "$not" => !matches(row, condition),
            field => field_matches(row, field, condition),
        };
        if !ok {
            return false;
        }
    }
    true
}

/// Evaluate one field condition: a bare literal means `$eq`, an operator
/// object AND-s its comparison operators.
fn field_matches(row: &Row, field: &str, condition: &Value) -> bool {
    let obj = match condition {
        Value::Object(obj) if obj.keys().any(|k| k.starts_with('$')) => obj,
        literal => return loose_eq(&field_value(row, field), literal),
    };

    let value = field_value(row, field);
    let options_ci = obj
        .get("$options")
        .and_then(|v| v.as_str())
        .map(|s| s.contains('i'))
        .unwrap_or(false);

    for (op, operand) in obj {
        let ok = match op.as_str() {
            "$eq" => loose_eq(&value, operand),
            "$eqi" => to_text(&value).eq_ignore_ascii_case(&to_text(operand)),
            "$ne" => !loose_eq(&value, operand),
            "$in" => in_set(&value, operand),
            "$nin" => !in_set(&value, operand),
            "$exists" => {
                let present = !is_null_like_opt(get_field(row, field));
                present == truthy(operand)
            }
            "$gt" => compare_values(&value, operand) == std::cmp::Ordering::Greater,
            "$gte" => compare_values(&value, operand) != std::cmp::Ordering::Less,
            "$lt" => compare_values(&value, operand) == std::cmp::Ordering::Less,
            "$lte" => compare_values(&value, operand) != std::cmp::Ordering::Greater,
            "$regex" => regex_matches(&value, operand, options_ci),
            "$regexi" => regex_matches(&value, operand, true),
            "$isTrue" => truthy(&value),
            "$isFalse" => !truthy(&value),
            // Field-scoped $not negates a nested comparison sub-object.
            "$not" => !field_matches(row, field, operand),
            "$options" => true,
            // Unknown operators are ignored rather than rejected.
            _ => true,
        };
        if !ok {
            return false;
        }
    }
    true
}

/// Case-insensitive text set membership for `$in`/`$nin`.
fn in_set(value: &Value, operand: &Value) -> bool {
    let items = match operand {
        Value::Array(items) => items,
        single => return loose_eq(value, single),
    };
    let needle = to_text(value);
    items
        .iter()
        .any(|item| to_text(item).eq_ignore_ascii_case(&needle))
}

fn regex_matches(value: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    if is_null_like(value) {
        return false;
    }
    match safe_regex(&to_text(pattern), case_insensitive) {
        Ok(re) => re.is_match(&to_text(value)),
        // Invalid or oversized patterns never match.
        Err(_) => false,
    }
}
