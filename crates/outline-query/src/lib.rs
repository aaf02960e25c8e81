//! # outline-query
//!
//! Compiles structured queries over an outline graph (pages and blocks with
//! references, parents and children) into Datalog.
//!
//! This crate provides:
//! - **Relation Registry**: the closed catalog of relation operators
//! - **Query Model**: clauses, negations, nested groups and selections
//! - **Compiler**: binding-checked translation into `:find`/`:where` Datalog
//! - **Selections**: a small formula language for computed columns
//! - **Outline adapter**: reading queries from persisted outline trees
//!
//! Execution against a graph store lives in `outline-query-executor`.
//!
//! ## Usage
//!
//! ```rust
//! use outline_query::{compile, Clause, Query, Selection};
//!
//! let query = Query::new("Page")
//!     .with_condition(Clause::new("c1", "Page", "is referenced by", "Block"))
//!     .with_condition(Clause::new("c2", "Block", "with text", "TODO").with_negated(true))
//!     .with_selection(Selection::new("s1", "Title", "upper(Page)"));
//!
//! let compiled = compile(&query).unwrap();
//! assert_eq!(compiled.find, vec!["Page"]);
//! println!("{}", compiled);
//! ```
//!
//! ## Relations
//!
//! | Relation | Target | Example |
//! |----------|--------|---------|
//! | `is a` | `page` / `block` | `Node is a page` |
//! | `has title` | text | `Page has title Daily Notes` |
//! | `with text` | text | `Block with text TODO` |
//! | `references` | node | `Block references Page` |
//! | `has child` | node | `Parent has child Block` |
//! | `created before` | date | `Block created before 2022-01-01` |
//!
//! See [`RelationRegistry::labels`] for the full list.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod compiler;
pub mod datalog;
mod error;
mod model;
pub mod outline;
mod relation;
pub mod selection;
mod text;
mod value;

pub use compiler::{compile, CompiledQuery};
pub use datalog::{DatalogClause, Term};
pub use error::{CompileError, CompileResult, IncompleteReason};
pub use model::{Clause, Condition, Group, Query, RelationRef, Selection};
pub use outline::{build_query, build_query_with_default, query_to_outline, OutlineNode};
pub use relation::{NodeKind, Relation, RelationDefinition, RelationRegistry, TargetKind};
pub use selection::{CompiledSelection, SelectionEvaluationError};
pub use text::parse_query_text;
pub use value::{BoundRow, Value, ValueKey};
