//! Superseding query session.
//!
//! A [`QuerySession`] belongs to one logical query instance (one editor, one
//! results table). Every submission takes the next sequence number; a newer
//! submission cancels the in-flight run of any older one, and a result is
//! only applied if no newer submission exists when it arrives. Completion
//! order therefore never decides which result is visible.

use std::sync::atomic::{AtomicU64, Ordering};

use outline_query::{compile, Query};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::ExecutorConfig;
use crate::error::ExecutorResult;
use crate::executor::QueryExecutor;
use crate::result::ResultSet;
use crate::traits::QueryBackend;

/// What happened to a submitted query.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The result is now the visible result set.
    Applied(ResultSet),
    /// A newer submission replaced this one; its result was discarded.
    Superseded {
        /// Sequence number of the discarded submission.
        sequence: u64,
    },
}

#[derive(Debug, Default)]
struct SessionState {
    applied: u64,
    visible: ResultSet,
}

/// Runs queries for one query instance, discarding stale results.
///
/// # Example
///
/// ```ignore
/// let session = QuerySession::new(graph_client);
///
/// match session.submit(&query).await? {
///     RunOutcome::Applied(result) => render(&result),
///     RunOutcome::Superseded { .. } => {} // a newer run owns the table
/// }
/// ```
pub struct QuerySession<B> {
    executor: QueryExecutor<B>,
    issued: AtomicU64,
    latest: watch::Sender<u64>,
    state: Mutex<SessionState>,
}

impl<B: QueryBackend> QuerySession<B> {
    /// Creates a session with default executor configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ExecutorConfig::default())
    }

    /// Creates a session with custom executor configuration.
    pub fn with_config(backend: B, config: ExecutorConfig) -> Self {
        let (latest, _) = watch::channel(0);
        Self {
            executor: QueryExecutor::with_config(backend, config),
            issued: AtomicU64::new(0),
            latest,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Returns the underlying executor.
    pub fn executor(&self) -> &QueryExecutor<B> {
        &self.executor
    }

    /// The result set currently visible to the caller.
    pub fn current(&self) -> ResultSet {
        self.state.lock().visible.clone()
    }

    /// Sequence number of the most recent submission (0 before any).
    pub fn latest_sequence(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Compiles and runs `query`, superseding any earlier submission.
    ///
    /// # Errors
    ///
    /// Compile and execution errors are returned only for the newest
    /// submission, and clear the visible rows. Errors of superseded
    /// submissions are dropped and reported as [`RunOutcome::Superseded`].
    pub async fn submit(&self, query: &Query) -> ExecutorResult<RunOutcome> {
        let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest.send_replace(sequence);
        let mut latest = self.latest.subscribe();
        debug!(sequence, "query submitted");

        let compiled = match compile(query) {
            Ok(compiled) => compiled,
            Err(err) => return self.finish(sequence, Err(err.into())),
        };

        let result = tokio::select! {
            result = self.executor.run_compiled(&compiled) => result,
            _ = superseded(&mut latest, sequence) => {
                warn!(sequence, "query superseded before completion");
                return Ok(RunOutcome::Superseded { sequence });
            }
        };

        self.finish(sequence, result)
    }

    fn finish(&self, sequence: u64, result: ExecutorResult<ResultSet>) -> ExecutorResult<RunOutcome> {
        let mut state = self.state.lock();
        if sequence < self.issued.load(Ordering::SeqCst) || sequence <= state.applied {
            warn!(sequence, "discarding stale query result");
            return Ok(RunOutcome::Superseded { sequence });
        }

        state.applied = sequence;
        match result {
            Ok(result) => {
                state.visible = result.clone();
                Ok(RunOutcome::Applied(result))
            }
            Err(err) => {
                state.visible = ResultSet::empty();
                Err(err)
            }
        }
    }
}

/// Resolves once a submission newer than `sequence` exists.
async fn superseded(latest: &mut watch::Receiver<u64>, sequence: u64) {
    loop {
        if *latest.borrow_and_update() > sequence {
            return;
        }
        if latest.changed().await.is_err() {
            // Sender gone: nothing can supersede this run any more.
            std::future::pending::<()>().await;
        }
    }
}
