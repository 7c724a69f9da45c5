//! Feedback panel state
//!
//! Holds the inputs of the feedback panel (API key, lookback, identifier
//! list) and the results of the last run. Mounting restores the last
//! checkpoint for inspection and export only; a new fetch always starts over.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use super::text_tools::format_id_list;
use crate::infrastructure::{ExportEmitter, ExportError, StorageError};
use crate::pipeline::{RunOrchestrator, RunReport, RunRequest};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct FeedbackSession {
    orchestrator: RunOrchestrator,
    exporter: ExportEmitter,

    pub api_key: String,
    pub lookback_days: u32,
    /// Comma-separated identifiers, as typed
    pub nmid_list: String,

    results: Vec<String>,
    csv_data: String,
    last_report: Option<RunReport>,
}

impl FeedbackSession {
    /// Create the session and restore whatever the last run checkpointed.
    pub async fn mount(
        orchestrator: RunOrchestrator,
        exporter: ExportEmitter,
        lookback_days: u32,
    ) -> Result<Self, StorageError> {
        let restored = orchestrator.progress().load_last_checkpoint().await?;
        let (results, csv_data) = restored
            .map(|progress| (progress.log, progress.csv_body))
            .unwrap_or_default();

        if !results.is_empty() {
            info!("📂 Session restored {} log lines from the last run", results.len());
        }

        Ok(Self {
            orchestrator,
            exporter,
            api_key: String::new(),
            lookback_days,
            nmid_list: String::new(),
            results,
            csv_data,
            last_report: None,
        })
    }

    /// Run a fresh fetch with the current inputs.
    pub async fn fetch(&mut self) -> &RunReport {
        let request = RunRequest {
            api_key: self.api_key.clone(),
            lookback_days: self.lookback_days,
            identifiers: self.nmid_list.clone(),
        };

        let report = self.orchestrator.run(&request).await;

        self.results.clone_from(&report.log);
        self.csv_data.clone_from(&report.csv_body);
        self.last_report.insert(report)
    }

    /// Export the CSV and forget the checkpoint once the file is written.
    pub async fn save_file(&mut self) -> Result<PathBuf, SessionError> {
        let path = self.exporter.export(&self.csv_data).await?;
        self.orchestrator.progress().clear().await?;
        Ok(path)
    }

    /// Normalize a pasted newline-separated list into the comma form.
    pub fn format_ids(&mut self) {
        self.nmid_list = format_id_list(&self.nmid_list);
    }

    pub fn results(&self) -> &[String] {
        &self.results
    }

    pub fn csv_data(&self) -> &str {
        &self.csv_data
    }

    pub const fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }
}
