//! Query engine: the fixed pipeline orchestrator.
//!
//! A [`QueryEngine`] borrows a read-only [`Table`] and evaluates
//! [`QuerySpec`]s against it, each evaluation allocating fresh result rows.
//! The stage order is a contract: compute -> filter -> group/aggregate ->
//! having -> topK -> sort -> limit -> select. Stages whose spec field is
//! absent are skipped.

use serde_json::Value;
use tracing::debug;

use crate::error::TabqlResult;
use crate::spec::QuerySpec;
use crate::table::{compact_row, Row, Table};

pub mod expr;
pub mod filter;
pub mod group;
pub mod select;
pub mod sort;
pub mod topk;
pub mod utils;

pub use expr::{Ctx, Expr};
pub use utils::{number_from_f64, safe_regex};

/// Result of one entry in a batch evaluation: rows, or a labeled error
/// string in the `"ERROR: <message>"` shape the summarization side expects.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Rows(Vec<Row>),
    Error(String),
}

/// Query engine bound to one table.
pub struct QueryEngine<'a> {
    table: &'a Table,
}

impl<'a> QueryEngine<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// Evaluate one spec through the fixed pipeline.
    pub fn execute(&self, spec: &QuerySpec) -> TabqlResult<Vec<Row>> {
        let mut rows: Vec<Row> = self.table.rows.clone();
        debug!(rows = rows.len(), "query start");

        if let Some(compute) = &spec.compute {
            rows = self.run_compute(rows, compute)?;
        }

        if let Some(predicate) = &spec.filter {
            rows.retain(|row| filter::matches(row, predicate));
            debug!(rows = rows.len(), "filter applied");
        }

        let aggregating = spec.is_aggregating();
        let group_keys = spec
            .group_by
            .as_deref()
            .map(group::parse_group_keys)
            .unwrap_or_default();

        if aggregating {
            rows = group::apply(rows, spec)?;
            debug!(rows = rows.len(), "aggregation applied");

            // Having only ever runs over aggregated rows.
            if let Some(predicate) = &spec.having {
                rows.retain(|row| filter::matches(row, predicate));
                debug!(rows = rows.len(), "having applied");
            }

            if let Some(topk) = &spec.top_k_per_group {
                rows = topk::apply(rows, topk, &group_keys);
                debug!(rows = rows.len(), k = topk.k(), "topK applied");
            }
        } else if let Some(fields) = &spec.limit_fields {
            rows = group::restrict_fields(rows, fields);
        }

        if let Some(sort_spec) = &spec.sort {
            sort::apply(&mut rows, sort_spec);
        }

        if let Some(limit) = spec.limit {
            rows.truncate(limit);
        }

        if let Some(select) = &spec.select {
            rows = select::apply(rows, select)?;
        }

        if spec.compact_nulls {
            rows = rows.iter().map(compact_row).collect();
        }

        debug!(rows = rows.len(), "query complete");
        Ok(rows)
    }

    /// Parse and evaluate a spec given as a raw JSON value.
    pub fn execute_value(&self, spec: &Value) -> TabqlResult<Vec<Row>> {
        let spec = QuerySpec::from_value(spec.clone())?;
        self.execute(&spec)
    }

    /// Evaluate a batch of labeled specs independently. A failing spec is
    /// reported as its labeled error string and never aborts its siblings.
    pub fn execute_batch(&self, specs: &[(String, Value)]) -> Vec<(String, BatchOutcome)> {
        specs
            .iter()
            .map(|(label, spec)| {
                let outcome = match self.execute_value(spec) {
                    Ok(rows) => BatchOutcome::Rows(rows),
                    Err(e) => {
                        debug!(label = %label, error = %e, "batch query failed");
                        BatchOutcome::Error(format!("ERROR: {}", e))
                    }
                };
                (label.clone(), outcome)
            })
            .collect()
    }

    /// Compute stage: each alias is evaluated against the original row, not
    /// against sibling aliases from the same pass, then written into a copy.
    fn run_compute(
        &self,
        rows: Vec<Row>,
        compute: &serde_json::Map<String, Value>,
    ) -> TabqlResult<Vec<Row>> {
        let aliases: Vec<(String, Expr)> = compute
            .iter()
            .map(|(alias, node)| Ok((alias.clone(), Expr::parse(node)?)))
            .collect::<TabqlResult<_>>()?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let computed: Vec<(String, Value)> = aliases
                    .iter()
                    .map(|(alias, expr)| (alias.clone(), expr.eval(Ctx::Row(&row))))
                    .collect();
                let mut out = row;
                for (alias, value) in computed {
                    out.insert(alias, value);
                }
                out
            })
            .collect())
    }
}
