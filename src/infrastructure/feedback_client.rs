//! Feedback page client
//!
//! One HTTP GET against the feedback-listing endpoint per call: builds the
//! request, injects the raw API key, unwraps the `data.feedbacks` envelope.
//! Retries are the batch scheduler's business, never this module's.

use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{Client, ClientBuilder, header::AUTHORIZATION};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::domain::constants::wildberries;
use crate::domain::{FeedbackQuery, FeedbackRecord, FetchError};
use crate::infrastructure::config::FetchConfig;

/// Anything that can return one page of feedback for a query.
///
/// An empty page means the query is exhausted.
#[async_trait]
pub trait FeedbackSource: Send + Sync {
    async fn fetch_page(
        &self,
        query: &FeedbackQuery,
        api_key: &str,
    ) -> Result<Vec<FeedbackRecord>, FetchError>;
}

/// Wildberries feedback API client
pub struct WildberriesClient {
    client: Client,
    endpoint: Url,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl WildberriesClient {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let endpoint = feedbacks_endpoint(&config.base_url)?;

        let client = ClientBuilder::new()
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {e}")))?;

        let rate_limiter = NonZeroU32::new(config.max_requests_per_second).map(|rps| {
            info!("🎯 Client-side quota enabled: {} requests/second", rps);
            RateLimiter::direct(Quota::per_second(rps))
        });

        Ok(Self {
            client,
            endpoint,
            rate_limiter,
        })
    }

    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build (without sending) the request for one page.
    pub fn build_request(
        &self,
        query: &FeedbackQuery,
        api_key: &str,
    ) -> Result<reqwest::Request, FetchError> {
        self.client
            .get(self.endpoint.clone())
            .query(&query.query_pairs())
            .header(AUTHORIZATION, api_key)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to build request: {e}")))
    }
}

#[async_trait]
impl FeedbackSource for WildberriesClient {
    async fn fetch_page(
        &self,
        query: &FeedbackQuery,
        api_key: &str,
    ) -> Result<Vec<FeedbackRecord>, FetchError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let request = self.build_request(query, api_key)?;
        debug!(
            "Fetching feedback page: product={:?} skip={}",
            query.product_id(),
            query.offset()
        );

        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16(), &body));
        }

        let records = parse_feedback_page(&body)?;
        debug!(
            "Received {} feedback records (product={:?}, skip={})",
            records.len(),
            query.product_id(),
            query.offset()
        );
        Ok(records)
    }
}

fn feedbacks_endpoint(base_url: &str) -> Result<Url, FetchError> {
    let base = Url::parse(base_url)
        .map_err(|e| FetchError::Network(format!("Invalid base URL '{base_url}': {e}")))?;
    base.join(wildberries::FEEDBACKS_PATH)
        .map_err(|e| FetchError::Network(format!("Invalid endpoint URL: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    data: Option<EnvelopeData>,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    error_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    feedbacks: Option<Vec<RawFeedback>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFeedback {
    #[serde(default)]
    product_details: Option<RawProductDetails>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    was_viewed: Option<bool>,
    #[serde(default)]
    created_date: Option<String>,
    #[serde(default)]
    product_valuation: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProductDetails {
    #[serde(default)]
    nm_id: Option<serde_json::Value>,
}

/// Unwrap a response body into records.
///
/// A missing or empty `data.feedbacks` is an empty page, not an error.
pub fn parse_feedback_page(body: &str) -> Result<Vec<FeedbackRecord>, FetchError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| FetchError::MalformedResponse(format!("Invalid response envelope: {e}")))?;

    if envelope.error {
        return Err(FetchError::MalformedResponse(format!(
            "API reported an error: {}",
            envelope.error_text.unwrap_or_default()
        )));
    }

    let feedbacks = envelope
        .data
        .and_then(|data| data.feedbacks)
        .unwrap_or_default();

    feedbacks.into_iter().map(into_record).collect()
}

fn into_record(raw: RawFeedback) -> Result<FeedbackRecord, FetchError> {
    let product_id = raw
        .product_details
        .and_then(|details| details.nm_id)
        .and_then(|nm_id| normalize_product_id(&nm_id))
        .ok_or_else(|| {
            FetchError::MalformedResponse("Feedback item without productDetails.nmId".to_string())
        })?;

    Ok(FeedbackRecord::normalized(
        product_id,
        raw.text,
        raw.user_name,
        raw.was_viewed,
        raw.created_date.as_deref(),
        raw.product_valuation,
    ))
}

/// nmId is numeric upstream; accept numeric strings too.
fn normalize_product_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::String(text) if !text.trim().is_empty() => {
            Some(text.trim().to_string())
        }
        _ => None,
    }
}
