//! # outline-query-executor
//!
//! Runs compiled outline queries against a graph store and shapes the
//! results into tables.
//!
//! This crate bridges the [`outline_query`] compiler and any store that can
//! evaluate Datalog. The store is abstracted behind [`QueryBackend`]; the
//! executor pairs returned tuples with the `:find` variables, merges rows
//! that share an id, and evaluates selection columns per row.
//!
//! ## Quick Start
//!
//! ```ignore
//! use outline_query::{Clause, Query, Selection};
//! use outline_query_executor::QueryExecutor;
//!
//! let executor = QueryExecutor::new(graph_client);
//!
//! let query = Query::new("Block")
//!     .with_condition(Clause::new("c1", "Block", "references", "Page"))
//!     .with_condition(Clause::new("c2", "Page", "has title", "Daily Notes"))
//!     .with_selection(Selection::new("s1", "Page Title", "upper(Page)"));
//!
//! let result = executor.run(&query).await?;
//! println!("Found {} blocks", result.len());
//! ```
//!
//! ## With Configuration
//!
//! ```ignore
//! use outline_query_executor::{ExecutorConfig, QueryExecutor};
//! use std::time::Duration;
//!
//! let config = ExecutorConfig::builder()
//!     .with_parallel(true)
//!     .with_max_results(100_000)
//!     .with_timeout(Duration::from_secs(10))
//!     .build();
//!
//! let executor = QueryExecutor::with_config(graph_client, config);
//! ```
//!
//! ## Superseding runs
//!
//! A [`QuerySession`] serves one query instance that is re-run as the user
//! edits it. Only the newest submission's result is ever applied; older
//! in-flight runs are cancelled or discarded.
//!
//! ## Feature Flags
//!
//! - `parallel` - Evaluates selections for large result sets using rayon
//! - `serde` - Serialize/deserialize result types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  outline-query-executor                      │
//! │                                                              │
//! │  QuerySession (newest submission wins)                       │
//! │  └── QueryExecutor                                           │
//! │      ├── compile Query → CompiledQuery (outline-query)       │
//! │      ├── run Datalog (via QueryBackend trait)                │
//! │      ├── bind tuples to :find variables                      │
//! │      └── ResultProjector: dedup by id, evaluate selections   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod config;
mod error;
mod executor;
mod projector;
mod result;
mod session;
mod traits;

// Public re-exports
pub use config::{ExecutorConfig, ExecutorConfigBuilder};
pub use error::{ExecutorError, ExecutorResult};
pub use executor::QueryExecutor;
pub use projector::ResultProjector;
pub use result::{Cell, ExecutionStats, ResultRow, ResultSet};
pub use session::{QuerySession, RunOutcome};
pub use traits::{BackendError, QueryBackend};

// Re-export commonly used types from dependencies for convenience
pub use outline_query::{BoundRow, CompiledQuery, Query, Value};
