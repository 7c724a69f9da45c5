//! Offset pagination over a single feedback query

use tracing::debug;

use crate::domain::{FeedbackQuery, FeedbackRecord, FetchError};
use crate::infrastructure::FeedbackSource;

/// Everything one query produced
#[derive(Debug, Clone, Default)]
pub struct PaginationResult {
    pub records: Vec<FeedbackRecord>,
    /// Non-empty pages received
    pub pages: u32,
}

/// Request pages from offset 0 until an empty page comes back.
///
/// Each following request starts where the previous page ended. The first
/// error is returned as is; retrying is the caller's business.
pub async fn fetch_all_for_query(
    source: &dyn FeedbackSource,
    base_query: &FeedbackQuery,
    api_key: &str,
) -> Result<PaginationResult, FetchError> {
    let mut query = base_query.at_offset(0);
    let mut result = PaginationResult::default();

    loop {
        let page = source.fetch_page(&query, api_key).await?;
        if page.is_empty() {
            break;
        }

        result.pages += 1;
        query.advance(page.len());
        result.records.extend(page);
        debug!(
            "🔄 Page {} received, next offset {}",
            result.pages,
            query.offset()
        );
    }

    Ok(result)
}
