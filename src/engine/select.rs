//! Select/projection stage: include/exclude columns, rename, derive simple
//! expression columns, optionally strip null-like fields.

use serde_json::Value;

use crate::error::TabqlResult;
use crate::spec::SelectSpec;
use crate::table::{compact_row, field_value, Row};

use super::expr::{Ctx, Expr};

/// Apply the projection to every row. Field resolution goes through the
/// central accessor, so aggregate aliases under `metrics` project cleanly.
pub fn apply(rows: Vec<Row>, select: &SelectSpec) -> TabqlResult<Vec<Row>> {
    let expressions = parse_expressions(select)?;

    let out = rows
        .into_iter()
        .map(|row| {
            let mut projected = Row::new();
            if select.include.is_empty() {
                // Empty include keeps everything, renames still apply.
                for (key, value) in &row {
                    projected.insert(renamed(select, key), value.clone());
                }
            } else {
                for name in &select.include {
                    projected.insert(renamed(select, name), field_value(&row, name));
                }
            }
            // Expression columns see the original row, not the projection.
            for (alias, expr) in &expressions {
                projected.insert(alias.clone(), expr.eval(Ctx::Row(&row)));
            }
            if select.exclude_nulls {
                compact_row(&projected)
            } else {
                projected
            }
        })
        .collect();
    Ok(out)
}

fn renamed(select: &SelectSpec, field: &str) -> String {
    for (from, to) in &select.rename {
        if from.eq_ignore_ascii_case(field) {
            if let Value::String(new_name) = to {
                return new_name.clone();
            }
        }
    }
    field.to_string()
}

/// `expressions` is accepted either as one alias -> expression object or as
/// an array of single-key objects.
fn parse_expressions(select: &SelectSpec) -> TabqlResult<Vec<(String, Expr)>> {
    let mut parsed = Vec::new();
    match &select.expressions {
        None => {}
        Some(Value::Object(map)) => {
            for (alias, node) in map {
                parsed.push((alias.clone(), Expr::parse(node)?));
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                if let Value::Object(map) = item {
                    for (alias, node) in map {
                        parsed.push((alias.clone(), Expr::parse(node)?));
                    }
                }
            }
        }
        Some(_) => {}
    }
    Ok(parsed)
}
