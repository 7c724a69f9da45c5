//! In-memory feedback sources for tests and benchmarks
//!
//! [`ScriptedSource`] serves pre-arranged pages per product, can fail on
//! demand, and records every call it receives along with the peak number
//! of requests outstanding at once.
//!
//! Only built for unit tests and with the `test-utils` feature:
//! `cargo test --features test-utils`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{FeedbackQuery, FeedbackRecord, FetchError};
use crate::infrastructure::FeedbackSource;

/// `(product filter, offset)` of one received call
pub type RecordedCall = (Option<String>, u64);

#[derive(Default)]
pub struct ScriptedSource {
    pages: HashMap<Option<String>, Vec<Vec<FeedbackRecord>>>,
    failures: HashMap<Option<String>, FetchError>,
    flaky: Mutex<HashMap<Option<String>, (usize, FetchError)>>,
    latency: Duration,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pages served for `product` (`None` = unfiltered query), in order.
    #[must_use]
    pub fn with_pages(mut self, product: Option<&str>, pages: Vec<Vec<FeedbackRecord>>) -> Self {
        self.pages.insert(product.map(str::to_string), pages);
        self
    }

    /// Every call for `product` fails with `error`.
    #[must_use]
    pub fn with_failure(mut self, product: Option<&str>, error: FetchError) -> Self {
        self.failures.insert(product.map(str::to_string), error);
        self
    }

    /// The first `times` calls for `product` fail with `error`.
    #[must_use]
    pub fn with_flaky(self, product: Option<&str>, times: usize, error: FetchError) -> Self {
        if let Ok(mut flaky) = self.flaky.lock() {
            flaky.insert(product.map(str::to_string), (times, error));
        }
        self
    }

    /// Simulated time each request stays outstanding.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, product: Option<&str>) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter(|(p, _)| p.as_deref() == product)
            .map(|(_, offset)| offset)
            .collect()
    }

    /// Peak number of requests outstanding at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_flaky_error(&self, product: &Option<String>) -> Option<FetchError> {
        let mut flaky = self.flaky.lock().ok()?;
        let (remaining, error) = flaky.get_mut(product)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(error.clone())
    }

    fn page_at(&self, product: &Option<String>, offset: u64) -> Result<Vec<FeedbackRecord>, FetchError> {
        let Some(pages) = self.pages.get(product) else {
            return Ok(Vec::new());
        };
        let mut consumed = 0u64;
        for page in pages {
            if consumed == offset {
                return Ok(page.clone());
            }
            consumed += page.len() as u64;
        }
        if consumed == offset {
            Ok(Vec::new())
        } else {
            Err(FetchError::MalformedResponse(format!(
                "offset {offset} does not fall on a page boundary"
            )))
        }
    }
}

#[async_trait]
impl FeedbackSource for ScriptedSource {
    async fn fetch_page(
        &self,
        query: &FeedbackQuery,
        _api_key: &str,
    ) -> Result<Vec<FeedbackRecord>, FetchError> {
        let product = query.product_id().map(str::to_string);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((product.clone(), query.offset()));
        }

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = self.failures.get(&product) {
            return Err(error.clone());
        }
        if let Some(error) = self.take_flaky_error(&product) {
            return Err(error);
        }
        self.page_at(&product, query.offset())
    }
}

/// `count` records for `product_id`; every other one carries text.
pub fn sample_records(product_id: &str, count: usize) -> Vec<FeedbackRecord> {
    (0..count)
        .map(|i| FeedbackRecord {
            product_id: product_id.to_string(),
            text: if i % 2 == 0 {
                format!("review {i} for {product_id}")
            } else {
                String::new()
            },
            author_name: format!("buyer-{i}"),
            verified: i % 3 == 0,
            created_at: "2024-03-01T12:00:00.000Z".to_string(),
            rating: i64::try_from(i % 5).unwrap_or(0) + 1,
        })
        .collect()
}
