//! Progress log of a run
//!
//! Every entry is also emitted through `tracing`, so the console and the
//! log file show the same lines the user sees in the run report.

use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLog {
    entries: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        info!("{}", entry);
        self.entries.push(entry);
    }

    /// Same as [`push`](Self::push) but logged at warn level
    pub fn push_failure(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        warn!("{}", entry);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}
