//! Infrastructure layer: HTTP access, durable storage, export and the
//! ambient configuration and logging setup.

pub mod config; // Configuration constants and file management
pub mod export;
pub mod feedback_client;
pub mod logging; // Logging infrastructure
pub mod progress_store;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager, FetchConfig};
pub use export::{DirectorySaver, ExportBlob, ExportEmitter, ExportError, FileSaver};
pub use feedback_client::{FeedbackSource, WildberriesClient, parse_feedback_page};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use progress_store::{
    FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, ProgressPersistence, RunProgress,
    StorageError,
};
