//! Query executor implementation.

use std::time::Instant;

use outline_query::{compile, BoundRow, CompiledQuery, Query};
use tracing::{debug, instrument};

use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, ExecutorResult};
use crate::projector::ResultProjector;
use crate::result::ResultSet;
use crate::traits::QueryBackend;

/// Runs compiled queries against a [`QueryBackend`].
///
/// The executor performs no caching and no retries: every call reaches the
/// backend, and failures are returned to the caller as they are.
///
/// # Example
///
/// ```ignore
/// use outline_query::{Clause, Query};
/// use outline_query_executor::QueryExecutor;
///
/// let executor = QueryExecutor::new(graph_client);
/// let query = Query::new("Page")
///     .with_condition(Clause::new("c1", "Page", "has title", "Daily Notes"));
///
/// let result = executor.run(&query).await?;
/// println!("Found {} pages", result.len());
/// ```
pub struct QueryExecutor<B> {
    backend: B,
    config: ExecutorConfig,
}

impl<B: QueryBackend> QueryExecutor<B> {
    /// Creates a new executor with default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ExecutorConfig::default())
    }

    /// Creates an executor with custom configuration.
    pub fn with_config(backend: B, config: ExecutorConfig) -> Self {
        Self { backend, config }
    }

    /// Returns a reference to the executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Returns a reference to the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Executes a compiled query and pairs each tuple with the `find` variables.
    ///
    /// # Errors
    ///
    /// - [`ExecutorError::ExecutionTimeout`] if a configured timeout elapses
    ///   or the backend reports one
    /// - [`ExecutorError::ExecutionFailed`] if the backend fails or returns a
    ///   tuple whose arity does not match `find`
    /// - [`ExecutorError::ResultTooLarge`] if a configured limit is exceeded
    #[instrument(level = "debug", skip_all, fields(find = ?query.find))]
    pub async fn execute(&self, query: &CompiledQuery) -> ExecutorResult<Vec<BoundRow>> {
        let pending = self.backend.query(query);
        let tuples = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| ExecutorError::ExecutionTimeout(limit))??,
            None => pending.await?,
        };

        if let Some(limit) = self.config.max_results {
            if tuples.len() > limit {
                return Err(ExecutorError::ResultTooLarge {
                    count: tuples.len(),
                    limit,
                });
            }
        }

        let arity = query.find.len();
        tuples
            .into_iter()
            .enumerate()
            .map(|(index, tuple)| {
                if tuple.len() != arity {
                    return Err(ExecutorError::ExecutionFailed(format!(
                        "tuple {} has {} values, expected {}",
                        index,
                        tuple.len(),
                        arity
                    )));
                }
                Ok(query.find.iter().cloned().zip(tuple).collect::<BoundRow>())
            })
            .collect()
    }

    /// Compiles, executes and projects `query`.
    pub async fn run(&self, query: &Query) -> ExecutorResult<ResultSet> {
        let compiled = compile(query)?;
        self.run_compiled(&compiled).await
    }

    /// Executes and projects an already compiled query.
    #[instrument(skip_all, fields(return_variable = %query.return_variable))]
    pub async fn run_compiled(&self, query: &CompiledQuery) -> ExecutorResult<ResultSet> {
        let start = Instant::now();

        let rows = self.execute(query).await?;
        let mut result = ResultProjector::new(query)
            .with_parallel(self.config.parallel)
            .project(rows);
        result.stats.duration = start.elapsed();

        debug!(
            rows = result.len(),
            elapsed_ms = result.stats.duration.as_millis() as u64,
            "query finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use outline_query::{Clause, Value};
    use std::time::Duration;

    use crate::traits::BackendError;

    struct FixedBackend {
        tuples: Vec<Vec<Value>>,
        delay: Duration,
    }

    #[async_trait]
    impl QueryBackend for FixedBackend {
        async fn query(&self, _query: &CompiledQuery) -> Result<Vec<Vec<Value>>, BackendError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.tuples.clone())
        }
    }

    fn backend(tuples: Vec<Vec<Value>>) -> FixedBackend {
        FixedBackend {
            tuples,
            delay: Duration::ZERO,
        }
    }

    fn page_query() -> CompiledQuery {
        compile(&Query::new("Page").with_condition(Clause::new("c1", "Page", "is a", "page")))
            .unwrap()
    }

    #[test]
    fn test_executor_new() {
        let executor = QueryExecutor::new(backend(vec![]));
        assert!(!executor.config().parallel);
        assert!(executor.config().timeout.is_none());
    }

    #[tokio::test]
    async fn test_execute_binds_find_variables() {
        let executor = QueryExecutor::new(backend(vec![vec![Value::Integer(1)]]));
        let rows = executor.execute(&page_query()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Page"), Some(&Value::Integer(1)));
    }

    #[tokio::test]
    async fn test_execute_rejects_wrong_arity() {
        let executor =
            QueryExecutor::new(backend(vec![vec![Value::Integer(1), Value::Integer(2)]]));
        let err = executor.execute(&page_query()).await.unwrap_err();
        assert!(matches!(err, ExecutorError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn test_execute_max_results() {
        let config = ExecutorConfig::builder().with_max_results(1).build();
        let executor = QueryExecutor::with_config(
            backend(vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]),
            config,
        );
        let err = executor.execute(&page_query()).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::ResultTooLarge { count: 2, limit: 1 }
        ));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let config = ExecutorConfig::builder()
            .with_timeout(Duration::from_millis(10))
            .build();
        let executor = QueryExecutor::with_config(
            FixedBackend {
                tuples: vec![],
                delay: Duration::from_secs(5),
            },
            config,
        );
        let err = executor.execute(&page_query()).await.unwrap_err();
        assert!(matches!(err, ExecutorError::ExecutionTimeout(_)));
    }

    #[tokio::test]
    async fn test_run_compile_error_never_reaches_backend() {
        let executor = QueryExecutor::new(backend(vec![vec![Value::Integer(1)]]));
        let err = executor.run(&Query::new("")).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Compile(_)));
    }
}
