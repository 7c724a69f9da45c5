//! Pipeline module - the fetch run from pagination up to orchestration
//!
//! - `pagination`: drains one query page by page
//! - `scheduler`: bounded worker pool over a shared target queue
//! - `orchestrator`: groups, aggregation, checkpoints and the summary
//! - `run_log`: the user-facing progress log of a run

pub mod orchestrator;
pub mod pagination;
pub mod run_log;
pub mod scheduler;

pub use orchestrator::{RunError, RunOrchestrator, RunReport, RunRequest, RunStatus};
pub use pagination::{PaginationResult, fetch_all_for_query};
pub use run_log::RunLog;
pub use scheduler::{BatchOutcome, BatchScheduler, IdentifierDone, IdentifierFailure, SchedulerConfig};
