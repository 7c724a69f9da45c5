//! Concurrency-limited batch scheduler
//!
//! A batch is one group of [`FetchTarget`]s. They go into a shared FIFO
//! queue drained by `min(concurrency_limit, targets)` workers; a worker takes
//! the next target as soon as it finishes its current one. Workers are plain
//! futures joined on the caller's task, and finished identifiers travel back
//! over an in-task channel, so the callback never runs concurrently with
//! itself.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use super::pagination::fetch_all_for_query;
use crate::domain::{FeedbackQuery, FeedbackRecord, FetchError, FetchTarget};
use crate::infrastructure::{FeedbackSource, FetchConfig};

/// Worker pool tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of identifiers paginated at the same time
    pub concurrency_limit: usize,
    /// Pause before the first request of each claimed identifier
    pub inter_request_delay: Duration,
    /// Extra attempts per identifier after a failed one
    pub retry_attempts: u32,
    /// Base of the exponential backoff between attempts
    pub retry_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_fetch_config(&FetchConfig::default())
    }
}

impl SchedulerConfig {
    pub fn from_fetch_config(config: &FetchConfig) -> Self {
        Self {
            concurrency_limit: config.concurrency_limit,
            inter_request_delay: config.inter_request_delay(),
            retry_attempts: config.retry_attempts,
            retry_backoff: config.retry_backoff(),
        }
    }

    /// Backoff before retry number `attempt` (1-based)
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_backoff.saturating_mul(factor)
    }
}

/// An identifier whose pagination finished
#[derive(Debug, Clone)]
pub struct IdentifierDone {
    pub target: FetchTarget,
    pub records: Vec<FeedbackRecord>,
    pub pages: u32,
}

/// An identifier that failed after every allowed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierFailure {
    pub target: FetchTarget,
    pub error: FetchError,
}

impl fmt::Display for IdentifierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to fetch feedback for {}: {}", self.target, self.error)
    }
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Records of every successful identifier, in completion order
    pub records: Vec<FeedbackRecord>,
    pub failures: Vec<IdentifierFailure>,
}

impl BatchOutcome {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

enum WorkerMessage {
    Done(IdentifierDone),
    Failed(IdentifierFailure),
}

pub struct BatchScheduler {
    source: Arc<dyn FeedbackSource>,
    config: SchedulerConfig,
}

impl BatchScheduler {
    pub fn new(source: Arc<dyn FeedbackSource>, config: SchedulerConfig) -> Self {
        Self { source, config }
    }

    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Fetch every target of the batch.
    ///
    /// `on_identifier_done` fires once per successful identifier, in
    /// completion order. Failures never stop sibling identifiers; they are
    /// collected in the returned outcome.
    pub async fn run_batch<F>(
        &self,
        targets: Vec<FetchTarget>,
        base_query: &FeedbackQuery,
        api_key: &str,
        mut on_identifier_done: F,
    ) -> BatchOutcome
    where
        F: FnMut(&IdentifierDone),
    {
        let total = targets.len();
        if total == 0 {
            return BatchOutcome::default();
        }

        let worker_count = self.config.concurrency_limit.max(1).min(total);
        info!(
            "🎯 Starting batch of {} targets with {} workers",
            total, worker_count
        );

        let queue = Mutex::new(targets.into_iter().collect::<VecDeque<_>>());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let workers = join_all(
            (0..worker_count)
                .map(|worker_id| self.worker(worker_id, &queue, base_query, api_key, tx.clone())),
        );
        // Only worker clones remain, so the receiver ends when the last one returns.
        drop(tx);

        let collect = async {
            let mut outcome = BatchOutcome::default();
            while let Some(message) = rx.recv().await {
                match message {
                    WorkerMessage::Done(done) => {
                        on_identifier_done(&done);
                        outcome.records.extend(done.records);
                    }
                    WorkerMessage::Failed(failure) => outcome.failures.push(failure),
                }
            }
            outcome
        };

        let (_, outcome) = tokio::join!(workers, collect);
        debug!(
            "Batch finished: {} records, {} failures",
            outcome.records.len(),
            outcome.failures.len()
        );
        outcome
    }

    async fn worker(
        &self,
        worker_id: usize,
        queue: &Mutex<VecDeque<FetchTarget>>,
        base_query: &FeedbackQuery,
        api_key: &str,
        tx: mpsc::UnboundedSender<WorkerMessage>,
    ) {
        loop {
            let Some(target) = queue.lock().await.pop_front() else {
                break;
            };
            debug!("Worker {} claimed {}", worker_id, target);

            let message = self.process_target(target, base_query, api_key).await;
            if tx.send(message).is_err() {
                break;
            }
        }
        debug!("Worker {} finished", worker_id);
    }

    async fn process_target(
        &self,
        target: FetchTarget,
        base_query: &FeedbackQuery,
        api_key: &str,
    ) -> WorkerMessage {
        let query = base_query.for_target(&target);
        let mut attempt = 0;

        loop {
            pause(self.config.inter_request_delay).await;

            match fetch_all_for_query(self.source.as_ref(), &query, api_key).await {
                Ok(result) => {
                    return WorkerMessage::Done(IdentifierDone {
                        target,
                        records: result.records,
                        pages: result.pages,
                    });
                }
                Err(error) if attempt < self.config.retry_attempts => {
                    attempt += 1;
                    let backoff = self.config.backoff_for(attempt);
                    warn!(
                        "🔄 Retrying {} in {:?} (attempt {}/{}): {}",
                        target, backoff, attempt, self.config.retry_attempts, error
                    );
                    pause(backoff).await;
                }
                Err(error) => {
                    return WorkerMessage::Failed(IdentifierFailure { target, error });
                }
            }
        }
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
