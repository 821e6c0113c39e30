//! tabql - JSON-specification-driven query and aggregation over in-memory
//! tabular data.
//!
//! The engine executes ad-hoc analytical operations (filtering, computed
//! columns, grouping, aggregation, post-aggregate filtering, sorting with
//! type inference, top-K-per-group selection, projection) against a
//! loosely-typed table, driven purely by a declarative JSON document rather
//! than code. There is no storage layer and no query planner: a `Table` is
//! read-only input, a `QuerySpec` describes the pipeline, and the result is
//! a fresh list of rows.
//!
//! # Main Components
//!
//! - **Table/Row**: case-insensitive field maps with smart type coercion
//! - **QuerySpec**: the declarative query document
//! - **QueryEngine**: parses spec stages and runs the fixed pipeline
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tabql::{QueryEngine, QuerySpec, Table};
//!
//! let rows = vec![
//!     json!({"region": "NL", "amount": "100,50"}),
//!     json!({"region": "NL", "amount": "20"}),
//!     json!({"region": "BE", "amount": "5"}),
//! ]
//! .into_iter()
//! .map(|v| v.as_object().unwrap().clone())
//! .collect();
//! let table = Table::from_rows(rows);
//!
//! let spec = QuerySpec::from_value(json!({
//!     "groupBy": ["region"],
//!     "aggregate": {"total": {"$sum": "amount"}},
//!     "sort": {"total": "desc"}
//! }))
//! .unwrap();
//!
//! let results = QueryEngine::new(&table).execute(&spec).unwrap();
//! assert_eq!(results[0]["region"], json!("NL"));
//! assert_eq!(results[0]["total"], json!(120.5));
//! ```

pub mod coerce;
pub mod engine;
pub mod error;
pub mod spec;
pub mod table;

// Re-export main types for convenience
pub use engine::{BatchOutcome, QueryEngine};
pub use error::{TabqlError, TabqlResult};
pub use spec::{OutputNaming, QuerySpec, SelectSpec, SortDirection, TopKSpec};
pub use table::{Row, Table};
