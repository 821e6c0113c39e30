//! Common test utilities for tabql tests
//!
//! Provides shared helper functions for:
//! - Building tables from `json!` rows
//! - Executing specs against a table
//! - One-time tracing setup (enable with RUST_LOG=tabql=debug)

#![allow(dead_code)]

use std::sync::Once;

use serde_json::Value;
use tabql::{QueryEngine, QuerySpec, Row, Table};

static TRACING: Once = Once::new();

/// Install the test subscriber once per process; stage-level debug output
/// is opt-in through the usual env filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn row(value: Value) -> Row {
    value.as_object().expect("row fixture must be an object").clone()
}

pub fn table(rows: Vec<Value>) -> Table {
    Table::from_rows(rows.into_iter().map(row).collect())
}

pub fn run(table: &Table, spec: Value) -> Vec<Row> {
    init_tracing();
    let spec = QuerySpec::from_value(spec).expect("invalid spec");
    QueryEngine::new(table).execute(&spec).expect("query failed")
}

pub fn sales_table() -> Table {
    table(vec![
        serde_json::json!({"product": "Widget", "category": "A", "amount": "100", "qty": 5}),
        serde_json::json!({"product": "Gadget", "category": "A", "amount": "200", "qty": 3}),
        serde_json::json!({"product": "Widget", "category": "a", "amount": "150", "qty": 7}),
        serde_json::json!({"product": "Gizmo", "category": "B", "amount": "75", "qty": 10}),
        serde_json::json!({"product": "Gadget", "category": "B", "amount": "250", "qty": 2}),
        serde_json::json!({"product": "Widget", "category": "B", "amount": "50", "qty": 20}),
    ])
}
