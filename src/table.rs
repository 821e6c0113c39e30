//! Table and row model.
//!
//! A `Table` is an ordered list of column names plus an ordered list of rows.
//! A `Row` is a field -> value map; lookups are case-insensitive and fall back
//! to the nested `metrics` sub-object and a small set of legacy aggregate
//! alias suffixes. All stages resolve fields through [`get_field`] so the
//! fallback chain lives in exactly one place.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single row: field name -> dynamic value.
pub type Row = serde_json::Map<String, Value>;

/// Field holding nested aggregate output when `outputNaming` is `"nested"`.
pub const METRICS_FIELD: &str = "metrics";

/// Aggregate alias suffixes from the older flat naming convention, still
/// accepted when resolving sort/filter field references.
pub const LEGACY_AGG_SUFFIXES: &[&str] =
    &["_count", "_sum", "_avg", "_min", "_max", "_countNotNull"];

/// Legacy sentinel date strings treated as absent values.
const SENTINEL_DATES: &[&str] = &["0000-00-00", "0000-00-00 00:00:00"];

/// In-memory table: ordered columns plus rows. The engine never mutates a
/// table; every query evaluation allocates fresh result rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Build a table from rows alone, deriving columns in first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c.eq_ignore_ascii_case(key)) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Case-insensitive key lookup in a single map level.
fn lookup<'a>(map: &'a Row, name: &str) -> Option<&'a Value> {
    if let Some(v) = map.get(name) {
        return Some(v);
    }
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// Walk a dotted path through nested objects, case-insensitive per segment.
fn lookup_path<'a>(map: &'a Row, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        None => lookup(map, path),
        Some((head, rest)) => match lookup(map, head) {
            Some(Value::Object(inner)) => lookup_path(inner, rest),
            _ => None,
        },
    }
}

/// Resolve a field reference against a row.
///
/// Resolution order: exact field name (case-insensitive, so a column
/// literally named `unit.price` stays reachable), dotted path into nested
/// objects (`metrics.total`), plain alias inside the `metrics` sub-object,
/// then the legacy aggregate suffixes (`total` -> `total_sum`), direct and
/// inside `metrics`. Returns `None` when nothing matches; callers treat that
/// as a null value, never as an error.
pub fn get_field<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    if let Some(v) = lookup(row, name) {
        return Some(v);
    }
    if name.contains('.') {
        if let Some(v) = lookup_path(row, name) {
            return Some(v);
        }
    }
    let metrics = match lookup(row, METRICS_FIELD) {
        Some(Value::Object(inner)) => Some(inner),
        _ => None,
    };
    if let Some(inner) = metrics {
        if let Some(v) = lookup(inner, name) {
            return Some(v);
        }
    }
    for suffix in LEGACY_AGG_SUFFIXES {
        let candidate = format!("{}{}", name, suffix);
        if let Some(v) = lookup(row, &candidate) {
            return Some(v);
        }
        if let Some(inner) = metrics {
            if let Some(v) = lookup(inner, &candidate) {
                return Some(v);
            }
        }
    }
    None
}

/// Resolve a field and clone it, yielding `Null` for missing fields.
pub fn field_value(row: &Row, name: &str) -> Value {
    get_field(row, name).cloned().unwrap_or(Value::Null)
}

/// Whether a value counts as absent: null, empty/whitespace text, or one of
/// the legacy sentinel date strings. Downstream consumers rely on this exact
/// rule to decide column presence.
pub fn is_null_like(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let t = s.trim();
            t.is_empty() || SENTINEL_DATES.contains(&t)
        }
        _ => false,
    }
}

/// `is_null_like` over an optional resolution result (missing field counts).
pub fn is_null_like_opt(value: Option<&Value>) -> bool {
    value.map(is_null_like).unwrap_or(true)
}

/// Strip null-like fields from a row. Nested objects (the `metrics`
/// sub-object) are compacted recursively and dropped entirely when empty.
pub fn compact_row(row: &Row) -> Row {
    let mut out = Row::new();
    for (key, value) in row {
        match value {
            Value::Object(inner) => {
                let compacted = compact_row(inner);
                if !compacted.is_empty() {
                    out.insert(key.clone(), Value::Object(compacted));
                }
            }
            v if is_null_like(v) => {}
            v => {
                out.insert(key.clone(), v.clone());
            }
        }
    }
    out
}
