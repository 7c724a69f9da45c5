//! Run orchestration
//!
//! A run clears stale progress, fetches every group of targets in order,
//! folds finished identifiers into the [`Aggregator`], checkpoints after each
//! group and closes with summary lines. Per-identifier failures only produce
//! log lines. Invalid inputs and checkpoint I/O errors abort the run with
//! one final log entry; input checks run before stale progress is cleared.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::run_log::RunLog;
use super::scheduler::{BatchScheduler, SchedulerConfig};
use crate::domain::constants::aggregation::TEXT_THRESHOLD;
use crate::domain::{
    Aggregator, FeedbackQuery, LookbackOutOfRange, Summary, parse_identifier_list,
    partition_groups, targets_for,
};
use crate::infrastructure::{FeedbackSource, FetchConfig, ProgressPersistence, StorageError};

/// Errors that end a run early
#[derive(Error, Debug)]
pub enum RunError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("{0}")]
    InvalidLookback(#[from] LookbackOutOfRange),

    #[error("failed to persist progress: {0}")]
    Storage(#[from] StorageError),
}

/// Inputs of one fetch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub api_key: String,
    pub lookback_days: u32,
    /// Comma-separated product identifiers; blank means all products
    pub identifiers: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Completed,
    Aborted(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub summary: Summary,
    pub csv_body: String,
    pub log: Vec<String>,
    /// Display form of every identifier failure
    pub failures: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

pub struct RunOrchestrator {
    scheduler: BatchScheduler,
    progress: ProgressPersistence,
    page_size: u32,
    group_size: usize,
}

/// Mutable state of a run in flight
struct RunState {
    log: RunLog,
    aggregator: Aggregator,
    failures: Vec<String>,
}

impl RunOrchestrator {
    pub fn new(
        source: Arc<dyn FeedbackSource>,
        progress: ProgressPersistence,
        config: &FetchConfig,
    ) -> Self {
        Self::from_parts(
            BatchScheduler::new(source, SchedulerConfig::from_fetch_config(config)),
            progress,
            config.page_size,
            config.group_size,
        )
    }

    pub const fn from_parts(
        scheduler: BatchScheduler,
        progress: ProgressPersistence,
        page_size: u32,
        group_size: usize,
    ) -> Self {
        Self {
            scheduler,
            progress,
            page_size,
            group_size,
        }
    }

    pub const fn progress(&self) -> &ProgressPersistence {
        &self.progress
    }

    pub async fn run(&self, request: &RunRequest) -> RunReport {
        self.run_at(request, Utc::now()).await
    }

    /// Run with the query window pinned at `now`.
    pub async fn run_at(&self, request: &RunRequest, now: DateTime<Utc>) -> RunReport {
        let run_id = Uuid::new_v4();
        info!("🚀 Starting feedback run {}", run_id);

        let mut state = RunState {
            log: RunLog::new(),
            aggregator: Aggregator::new(),
            failures: Vec::new(),
        };

        let status = match self.execute(request, now, &mut state).await {
            Ok(()) => RunStatus::Completed,
            Err(e) => {
                state.log.push_failure(format!("Run aborted: {e}"));
                RunStatus::Aborted(e.to_string())
            }
        };

        let summary = state.aggregator.summarize();
        RunReport {
            run_id,
            status,
            summary,
            csv_body: state.aggregator.into_state().into_csv_body(),
            log: state.log.into_entries(),
            failures: state.failures,
            started_at: now,
            finished_at: Utc::now(),
        }
    }

    async fn execute(
        &self,
        request: &RunRequest,
        now: DateTime<Utc>,
        state: &mut RunState,
    ) -> Result<(), RunError> {
        if request.api_key.trim().is_empty() {
            return Err(RunError::MissingApiKey);
        }

        let base_query = FeedbackQuery::for_lookback(request.lookback_days, self.page_size, now)?;

        self.progress.clear().await?;
        state.log.push(format!(
            "Fetching answered feedback for the last {} days",
            request.lookback_days
        ));

        let identifiers = parse_identifier_list(&request.identifiers);
        let groups = partition_groups(targets_for(&identifiers), self.group_size);
        if identifiers.is_empty() {
            state
                .log
                .push("No nmIds given, fetching feedback for all products");
        } else {
            state.log.push(format!(
                "Processing {} nmIds in {} group(s)",
                identifiers.len(),
                groups.len()
            ));
        }

        let group_count = groups.len();
        for (index, group) in groups.into_iter().enumerate() {
            state.log.push(format!(
                "Group {}/{}: fetching {} target(s)",
                index + 1,
                group_count,
                group.len()
            ));

            let RunState {
                log, aggregator, ..
            } = &mut *state;
            let outcome = self
                .scheduler
                .run_batch(group, &base_query, request.api_key.trim(), |done| {
                    aggregator.ingest(&done.records);
                    log.push(format!(
                        "✅ {}: {} feedback(s) in {} page(s)",
                        done.target,
                        done.records.len(),
                        done.pages
                    ));
                })
                .await;

            for failure in outcome.failures {
                let line = failure.to_string();
                state.log.push_failure(format!("❌ {line}"));
                state.failures.push(line);
            }

            self.progress
                .checkpoint(state.aggregator.csv_body(), state.log.entries())
                .await?;
        }

        let summary = state.aggregator.summarize();
        state
            .log
            .push(format!("Total processed: {}", summary.total_processed));
        state
            .log
            .push(format!("Unique IDs: {}", summary.unique_count));
        state
            .log
            .push(format!("Feedback with text: {}", summary.non_empty_text_count));
        state.log.push(format!(
            "IDs with more than {} texts: {}",
            TEXT_THRESHOLD, summary.ids_with_more_than_n_texts
        ));
        state
            .log
            .push(format!("Failures: {}", state.failures.len()));

        self.progress
            .checkpoint(state.aggregator.csv_body(), state.log.entries())
            .await?;
        Ok(())
    }
}
