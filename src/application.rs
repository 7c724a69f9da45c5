//! Application layer module
//!
//! Per-feature state stores composed by the CLI: the feedback panel
//! session and the stateless identifier list tools.

pub mod feedback_session;
pub mod text_tools;

pub use feedback_session::{FeedbackSession, SessionError};
pub use text_tools::InputFormatError;
