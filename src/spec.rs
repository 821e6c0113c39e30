//! Query specification document.
//!
//! A `QuerySpec` is a declarative JSON document, typically machine-generated,
//! describing a pipeline of compute/filter/group/aggregate/having/sort/topK/
//! select stages. Unknown top-level fields are ignored so that an evolving
//! spec grammar degrades gracefully; the only hard failure is text that is
//! not valid JSON at all.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{TabqlError, TabqlResult};

/// Where aggregate aliases land in result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputNaming {
    /// Aliases at the row top level.
    #[default]
    Flat,
    /// Aliases under a nested `metrics` sub-object.
    Nested,
}

/// Top-K-per-group stage: keep the best `k` rows per outer group key,
/// ordered by the `by` metric.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopKSpec {
    pub by: String,
    pub order: SortDirection,
    pub k: usize,
}

impl Default for TopKSpec {
    fn default() -> Self {
        Self {
            by: String::new(),
            order: SortDirection::Desc,
            k: 3,
        }
    }
}

impl TopKSpec {
    /// Effective k: the configured value, floored at 1.
    pub fn k(&self) -> usize {
        self.k.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse a sort-spec direction value: `"asc"`/`"desc"` (any case) or a
    /// signed number where negative means descending. Anything else is
    /// ascending.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) if s.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Value::Number(n) if n.as_f64().unwrap_or(0.0) < 0.0 => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }
}

/// Projection stage: include/exclude columns, rename, derive expression
/// columns, optionally strip null-like fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectSpec {
    /// Fields to keep; empty means keep everything.
    pub include: Vec<String>,
    /// Old name -> new name, applied to included and passthrough fields.
    pub rename: serde_json::Map<String, Value>,
    /// Alias -> expression, as an object or an array of single-key objects.
    pub expressions: Option<Value>,
    pub exclude_nulls: bool,
}

/// The parsed query document. Field presence decides which pipeline stages
/// run; see [`crate::engine::QueryEngine::execute`] for the fixed order.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuerySpec {
    /// Alias -> scalar expression, evaluated against each original row
    /// before filtering.
    pub compute: Option<serde_json::Map<String, Value>>,
    /// Predicate tree applied before aggregation.
    pub filter: Option<Value>,
    /// Group key fields; entries are names or `{"$toLower": name}`.
    pub group_by: Option<Vec<Value>>,
    /// Alias -> aggregate expression.
    pub aggregate: Option<serde_json::Map<String, Value>>,
    /// Predicate tree applied after aggregation.
    pub having: Option<Value>,
    /// Field -> `"asc"|"desc"` (or signed number), primary key first.
    pub sort: Option<serde_json::Map<String, Value>>,
    pub limit: Option<usize>,
    pub top_k_per_group: Option<TopKSpec>,
    pub select: Option<SelectSpec>,
    /// Passthrough-mode column restriction (no groupBy/aggregate).
    pub limit_fields: Option<Vec<String>>,
    pub output_naming: OutputNaming,
    #[serde(default = "default_true")]
    pub include_group_keys: bool,
    pub compact_nulls: bool,
}

fn default_true() -> bool {
    true
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            compute: None,
            filter: None,
            group_by: None,
            aggregate: None,
            having: None,
            sort: None,
            limit: None,
            top_k_per_group: None,
            select: None,
            limit_fields: None,
            output_naming: OutputNaming::Flat,
            include_group_keys: true,
            compact_nulls: false,
        }
    }
}

impl QuerySpec {
    /// Parse a spec from JSON text. Invalid JSON is the one condition that
    /// propagates as a hard failure to the caller.
    pub fn parse(text: &str) -> TabqlResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| TabqlError::SpecError(format!("invalid query spec JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Build a spec from an already-parsed JSON value.
    pub fn from_value(value: Value) -> TabqlResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| TabqlError::SpecError(format!("invalid query spec: {}", e)))
    }

    /// Whether this spec runs an aggregation stage at all.
    pub fn is_aggregating(&self) -> bool {
        self.group_by.as_ref().map(|g| !g.is_empty()).unwrap_or(false)
            || self.aggregate.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let spec = QuerySpec::parse("{}").unwrap();
        assert!(spec.include_group_keys);
        assert!(!spec.compact_nulls);
        assert_eq!(spec.output_naming, OutputNaming::Flat);
        assert!(!spec.is_aggregating());
    }

    #[test]
    fn test_unknown_top_level_fields_ignored() {
        let spec = QuerySpec::from_value(json!({
            "groupBy": ["region"],
            "someFutureKnob": {"a": 1}
        }))
        .unwrap();
        assert!(spec.is_aggregating());
    }

    #[test]
    fn test_topk_defaults_and_floor() {
        let spec = QuerySpec::from_value(json!({"topKPerGroup": {"by": "total"}})).unwrap();
        let topk = spec.top_k_per_group.unwrap();
        assert_eq!(topk.k(), 3);
        assert_eq!(topk.order, SortDirection::Desc);

        let spec = QuerySpec::from_value(json!({"topKPerGroup": {"by": "total", "k": 0}})).unwrap();
        assert_eq!(spec.top_k_per_group.unwrap().k(), 1);
    }

    #[test]
    fn test_invalid_json_is_hard_failure() {
        assert!(matches!(
            QuerySpec::parse("{not json"),
            Err(TabqlError::SpecError(_))
        ));
    }
}
