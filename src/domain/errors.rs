//! Fetch error taxonomy
//!
//! Every network-touching operation returns `Result<T, FetchError>`. Both
//! variants propagate the same way: the batch scheduler catches them per
//! identifier and turns them into failure entries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchError {
    /// Transport failure or non-success HTTP status
    #[error("Network error: {0}")]
    Network(String),

    /// Response body does not have the expected envelope structure
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Build a network error from a non-success status and (truncated) body
    pub fn from_status(status: u16, body: &str) -> Self {
        const MAX_BODY_CHARS: usize = 200;
        let snippet: String = body.chars().take(MAX_BODY_CHARS).collect();
        if snippet.trim().is_empty() {
            Self::Network(format!("HTTP request failed with status {status}"))
        } else {
            Self::Network(format!(
                "HTTP request failed with status {status}: {}",
                snippet.trim()
            ))
        }
    }
}

/// Lookback window whose start date cannot be represented
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("lookback of {days} days is outside the supported date range")]
pub struct LookbackOutOfRange {
    pub days: u32,
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}
