//! Traits for query execution.
//!
//! This module defines the [`QueryBackend`] trait that any graph store must
//! implement to run compiled queries. The executor never evaluates Datalog
//! itself; it hands the compiled query to the backend and shapes what comes
//! back.
//!
//! # Example: Implementing QueryBackend
//!
//! ```ignore
//! use async_trait::async_trait;
//! use outline_query::{CompiledQuery, Value};
//! use outline_query_executor::{BackendError, QueryBackend};
//!
//! struct GraphClient { /* ... */ }
//!
//! #[async_trait]
//! impl QueryBackend for GraphClient {
//!     async fn query(&self, query: &CompiledQuery) -> Result<Vec<Vec<Value>>, BackendError> {
//!         let text = query.to_datalog();
//!         self.post_query(&text).await.map_err(|e| BackendError::Failed(e.to_string()))
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use outline_query::{CompiledQuery, Value};
use thiserror::Error;

/// Failure reported by a graph store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The store gave up after the given duration.
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    /// The store rejected or failed the query.
    #[error("{0}")]
    Failed(String),
}

/// A graph store able to execute compiled Datalog queries.
///
/// Each returned tuple holds one value per variable of
/// [`CompiledQuery::find`], in the same order.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Executes `query` and returns its raw tuples.
    async fn query(&self, query: &CompiledQuery) -> Result<Vec<Vec<Value>>, BackendError>;
}

#[async_trait]
impl<T: QueryBackend + ?Sized> QueryBackend for Arc<T> {
    async fn query(&self, query: &CompiledQuery) -> Result<Vec<Vec<Value>>, BackendError> {
        (**self).query(query).await
    }
}
