//! Top-K-per-group stage.
//!
//! Operates on already-aggregated rows: rows are grouped by all group-by
//! keys except the last (the outer keys), ordered within each outer group by
//! the chosen metric, and the first k are kept. A single group-by key means
//! no outer keys, so all rows form one group.

use std::collections::HashMap;

use crate::coerce::compare_values;
use crate::spec::{SortDirection, TopKSpec};
use crate::table::{field_value, Row};

use super::group::{partition_key, GroupKey};

/// Apply top-K retention. Groups keep their first-appearance order; a group
/// with fewer than k rows keeps all of them.
pub fn apply(rows: Vec<Row>, topk: &TopKSpec, group_keys: &[GroupKey]) -> Vec<Row> {
    let outer_keys: &[GroupKey] = if group_keys.len() >= 2 {
        &group_keys[..group_keys.len() - 1]
    } else {
        &[]
    };

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
    for row in rows {
        let key = partition_key(&row, outer_keys);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(row);
    }

    let k = topk.k();
    let mut out = Vec::new();
    for key in order {
        if let Some(mut members) = groups.remove(&key) {
            members.sort_by(|a, b| {
                let ord = compare_values(&field_value(a, &topk.by), &field_value(b, &topk.by));
                match topk.order {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
            members.truncate(k);
            out.extend(members);
        }
    }
    out
}
