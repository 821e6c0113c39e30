//! Group/aggregate stage.
//!
//! Rows are partitioned by the stringified tuple of group-key values
//! (grouping is always on the exact, case-normalized key text, never on
//! smart-typed values) and each partition is reduced by the aggregate
//! expressions. Partition order follows first appearance in the input.

use std::collections::HashMap;

use serde_json::Value;

use crate::coerce::to_text;
use crate::error::TabqlResult;
use crate::spec::{OutputNaming, QuerySpec};
use crate::table::{field_value, get_field, Row, METRICS_FIELD};

use super::expr::{Ctx, Expr};

/// Separator between group-key components inside a partition key.
const KEY_SEPARATOR: char = '\u{1f}';

/// One `groupBy` entry: a field name, optionally wrapped as
/// `{"$toLower": field}` to lowercase the key before partitioning.
#[derive(Debug, Clone)]
pub struct GroupKey {
    pub field: String,
    pub lower: bool,
}

/// Parse `groupBy` entries; anything that is neither a string nor a
/// `$toLower` wrapper is ignored.
pub fn parse_group_keys(raw: &[Value]) -> Vec<GroupKey> {
    let mut keys = Vec::new();
    for entry in raw {
        match entry {
            Value::String(field) => keys.push(GroupKey { field: field.clone(), lower: false }),
            Value::Object(obj) => {
                if let Some(Value::String(field)) = obj.get("$toLower") {
                    keys.push(GroupKey { field: field.clone(), lower: true });
                }
            }
            _ => {}
        }
    }
    keys
}

/// The partition-key text for one group component, plus the value written to
/// the output row.
fn key_component(row: &Row, key: &GroupKey) -> (String, Value) {
    let value = field_value(row, &key.field);
    let text = to_text(&value);
    if key.lower {
        let lowered = text.to_lowercase();
        (lowered.clone(), Value::String(lowered))
    } else {
        (text, value)
    }
}

/// Join the per-key components into one partition key.
pub fn partition_key(row: &Row, keys: &[GroupKey]) -> String {
    let mut out = String::new();
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(KEY_SEPARATOR);
        }
        out.push_str(&key_component(row, key).0);
    }
    out
}

/// Run grouping and aggregation over the filtered rows. With no `groupBy`
/// the aggregate expressions reduce the whole input once.
pub fn apply(rows: Vec<Row>, spec: &QuerySpec) -> TabqlResult<Vec<Row>> {
    let keys = spec
        .group_by
        .as_deref()
        .map(parse_group_keys)
        .unwrap_or_default();

    let aggregates: Vec<(String, Expr)> = match &spec.aggregate {
        Some(map) => map
            .iter()
            .map(|(alias, node)| Ok((alias.clone(), Expr::parse(node)?)))
            .collect::<TabqlResult<_>>()?,
        None => Vec::new(),
    };

    if keys.is_empty() {
        // Aggregate-only: one partition over the whole table.
        return Ok(vec![reduce_partition(&[], &rows, &aggregates, spec)]);
    }

    let mut order: Vec<String> = Vec::new();
    let mut partitions: HashMap<String, (Vec<(String, Value)>, Vec<Row>)> = HashMap::new();
    for row in rows {
        let key = partition_key(&row, &keys);
        let entry = partitions.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            let key_values = keys
                .iter()
                .map(|k| (k.field.clone(), key_component(&row, k).1))
                .collect();
            (key_values, Vec::new())
        });
        entry.1.push(row);
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        if let Some((key_values, members)) = partitions.remove(&key) {
            out.push(reduce_partition(&key_values, &members, &aggregates, spec));
        }
    }
    Ok(out)
}

fn reduce_partition(
    key_values: &[(String, Value)],
    members: &[Row],
    aggregates: &[(String, Expr)],
    spec: &QuerySpec,
) -> Row {
    let mut row = Row::new();
    // Group keys stay at the top level in both naming modes.
    if spec.include_group_keys {
        for (field, value) in key_values {
            row.insert(field.clone(), value.clone());
        }
    }
    match spec.output_naming {
        OutputNaming::Flat => {
            for (alias, expr) in aggregates {
                row.insert(alias.clone(), expr.eval(Ctx::Rows(members)));
            }
        }
        OutputNaming::Nested => {
            let mut metrics = Row::new();
            for (alias, expr) in aggregates {
                metrics.insert(alias.clone(), expr.eval(Ctx::Rows(members)));
            }
            row.insert(METRICS_FIELD.to_string(), Value::Object(metrics));
        }
    }
    row
}

/// Passthrough-mode column restriction (`limitFields` without grouping).
/// Fields a row does not have are omitted, not materialized as null.
pub fn restrict_fields(rows: Vec<Row>, fields: &[String]) -> Vec<Row> {
    rows.into_iter()
        .map(|row| {
            let mut out = Row::new();
            for field in fields {
                if let Some(value) = get_field(&row, field) {
                    out.insert(field.clone(), value.clone());
                }
            }
            out
        })
        .collect()
}
