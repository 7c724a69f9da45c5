//! Feedback Harvester - Marketplace Feedback Fetching Library
//!
//! Fetches seller feedback from the Wildberries feedback API with cursor
//! pagination, a bounded worker pool and per-group checkpoints, then
//! aggregates it into summary statistics and a CSV export.

// Module declarations
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod pipeline;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the pieces the binary and integration tests reach for
pub use application::{FeedbackSession, text_tools};
pub use domain::{
    Aggregator, FeedbackQuery, FeedbackRecord, FetchError, FetchTarget, Summary,
};
pub use pipeline::{BatchScheduler, RunOrchestrator, RunReport, RunRequest, RunStatus};
