//! Configuration types for the query executor.

use std::time::Duration;

/// Configuration for the query executor.
///
/// Every option defaults to off or unlimited: without configuration the
/// executor imposes no timeout and no result limit.
///
/// # Example
///
/// ```rust
/// use outline_query_executor::ExecutorConfig;
/// use std::time::Duration;
///
/// let config = ExecutorConfig::builder()
///     .with_parallel(true)
///     .with_max_results(10_000)
///     .with_timeout(Duration::from_secs(30))
///     .build();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Evaluate selections on the rayon pool for large results
    /// (needs the `parallel` feature; ignored without it).
    pub parallel: bool,
    /// Upper bound on raw tuples taken from the backend, before merging.
    pub max_results: Option<usize>,
    /// Deadline for a single backend call.
    pub timeout: Option<Duration>,
}

impl ExecutorConfig {
    /// Starts a builder from the defaults.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Starts a builder from this configuration.
    pub fn to_builder(&self) -> ExecutorConfigBuilder {
        ExecutorConfigBuilder {
            config: self.clone(),
        }
    }
}

/// Fluent builder for [`ExecutorConfig`].
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfigBuilder {
    config: ExecutorConfig,
}

impl ExecutorConfigBuilder {
    /// Turns parallel selection evaluation on or off.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Fails queries whose backend returns more than `limit` tuples.
    pub fn with_max_results(mut self, limit: usize) -> Self {
        self.config.max_results = Some(limit);
        self
    }

    /// Bounds each backend call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Removes any configured timeout.
    pub fn without_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> ExecutorConfig {
        self.config
    }
}
