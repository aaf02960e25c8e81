//! Error types for query execution.

use std::time::Duration;

use outline_query::CompileError;
use thiserror::Error;

use crate::traits::BackendError;

/// Errors that can occur while running a query.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The query failed to compile; nothing was executed.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// The graph store failed or returned malformed tuples.
    #[error("query execution failed: {0}")]
    ExecutionFailed(String),

    /// Execution did not finish in time.
    #[error("query timeout after {0:?}")]
    ExecutionTimeout(Duration),

    /// The backend returned more tuples than the configured limit.
    #[error("result set too large: {count} exceeds limit {limit}")]
    ResultTooLarge {
        /// Number of tuples returned.
        count: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl From<BackendError> for ExecutorError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout(after) => ExecutorError::ExecutionTimeout(after),
            BackendError::Failed(message) => ExecutorError::ExecutionFailed(message),
        }
    }
}

/// Result type for executor operations.
pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;
