//! Incremental feedback aggregation
//!
//! The aggregator is the only writer of [`AggregateState`] during a run. It
//! keeps running counters, the set of products seen and the CSV body, so
//! nothing has to be recomputed when the run ends.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::constants::{aggregation::TEXT_THRESHOLD, export::CSV_HEADER};
use super::feedback::FeedbackRecord;

/// Accumulated state of one fetch run.
#[derive(Debug, Clone)]
pub struct AggregateState {
    total_processed: u64,
    unique_product_ids: HashSet<String>,
    non_empty_text_counts: HashMap<String, u64>,
    non_empty_text_total: u64,
    csv_body: String,
}

impl AggregateState {
    fn new() -> Self {
        let mut csv_body = String::with_capacity(CSV_HEADER.len() + 1);
        csv_body.push_str(CSV_HEADER);
        csv_body.push('\n');
        Self {
            total_processed: 0,
            unique_product_ids: HashSet::new(),
            non_empty_text_counts: HashMap::new(),
            non_empty_text_total: 0,
            csv_body,
        }
    }

    pub const fn total_processed(&self) -> u64 {
        self.total_processed
    }

    pub const fn unique_product_ids(&self) -> &HashSet<String> {
        &self.unique_product_ids
    }

    pub const fn non_empty_text_counts(&self) -> &HashMap<String, u64> {
        &self.non_empty_text_counts
    }

    pub const fn non_empty_text_total(&self) -> u64 {
        self.non_empty_text_total
    }

    pub fn csv_body(&self) -> &str {
        &self.csv_body
    }

    pub fn into_csv_body(self) -> String {
        self.csv_body
    }
}

/// Run-level statistics reported at the end of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_processed: u64,
    pub unique_count: usize,
    pub non_empty_text_count: u64,
    pub ids_with_more_than_n_texts: usize,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    state: AggregateState,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// Fresh state with the CSV header already written
    pub fn new() -> Self {
        Self {
            state: AggregateState::new(),
        }
    }

    pub fn ingest(&mut self, records: &[FeedbackRecord]) {
        for record in records {
            self.ingest_one(record);
        }
    }

    fn ingest_one(&mut self, record: &FeedbackRecord) {
        let state = &mut self.state;
        state.total_processed += 1;

        if !state.unique_product_ids.contains(&record.product_id) {
            state.unique_product_ids.insert(record.product_id.clone());
        }

        if record.has_text() {
            *state
                .non_empty_text_counts
                .entry(record.product_id.clone())
                .or_insert(0) += 1;
            state.non_empty_text_total += 1;
        }

        match encode_row(record) {
            Ok(row) => state.csv_body.push_str(&row),
            Err(e) => warn!(
                "⚠️ Failed to encode CSV row for product {}: {}",
                record.product_id, e
            ),
        }
    }

    /// Statistics over everything ingested so far.
    pub fn summarize(&self) -> Summary {
        let ids_with_more_than_n_texts = self
            .state
            .non_empty_text_counts
            .values()
            .filter(|&&count| count > TEXT_THRESHOLD)
            .count();

        Summary {
            total_processed: self.state.total_processed,
            unique_count: self.state.unique_product_ids.len(),
            non_empty_text_count: self.state.non_empty_text_total,
            ids_with_more_than_n_texts,
        }
    }

    pub const fn state(&self) -> &AggregateState {
        &self.state
    }

    pub fn csv_body(&self) -> &str {
        self.state.csv_body()
    }

    /// Hand the final state off, read-only, to whoever exports it.
    pub fn into_state(self) -> AggregateState {
        self.state
    }
}

/// One CSV data row: every field quoted, embedded quotes doubled,
/// newline terminated.
pub fn encode_row(record: &FeedbackRecord) -> anyhow::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .double_quote(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .buffer_capacity(256)
        .from_writer(Vec::with_capacity(128));

    let verified = if record.verified { "TRUE" } else { "FALSE" };
    let rating = record.rating.to_string();
    writer.write_record([
        record.product_id.as_str(),
        record.text.as_str(),
        record.author_name.as_str(),
        verified,
        record.created_at.as_str(),
        rating.as_str(),
    ])?;

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV row: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(product_id: &str, text: &str) -> FeedbackRecord {
        FeedbackRecord {
            product_id: product_id.to_string(),
            text: text.to_string(),
            author_name: "Ivan".to_string(),
            verified: true,
            created_at: "2024-03-01T12:30:00.000Z".to_string(),
            rating: 5,
        }
    }

    #[test]
    fn new_state_holds_only_the_header() {
        let aggregator = Aggregator::new();
        assert_eq!(aggregator.csv_body(), format!("{CSV_HEADER}\n"));
        assert_eq!(aggregator.summarize(), Summary::default());
    }

    #[test]
    fn rows_quote_every_field() {
        let row = encode_row(&record("101", "Great")).unwrap();
        assert_eq!(
            row,
            "\"101\",\"Great\",\"Ivan\",\"TRUE\",\"2024-03-01T12:30:00.000Z\",\"5\"\n"
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let row = encode_row(&record("1", r#"He said "hi""#)).unwrap();
        assert!(row.contains(r#""He said ""hi""""#));
    }

    #[test]
    fn newlines_and_commas_stay_inside_quotes() {
        let row = encode_row(&record("1", "line one,\nline two")).unwrap();
        assert!(row.starts_with("\"1\",\"line one,\nline two\",\"Ivan\""));
    }

    #[test]
    fn escaped_text_parses_back() {
        let text = r#"He said "hi""#;
        let mut aggregator = Aggregator::new();
        aggregator.ingest(&[record("1", text)]);

        let mut reader = csv::Reader::from_reader(aggregator.csv_body().as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(0), Some("PRODUCT ID"));

        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.get(1), Some(text));
        assert_eq!(row.get(3), Some("TRUE"));
    }

    #[test]
    fn counts_unique_ids_and_texts() {
        let mut aggregator = Aggregator::new();
        aggregator.ingest(&[
            record("1", "good"),
            record("1", ""),
            record("2", "bad"),
            record("3", ""),
        ]);

        let summary = aggregator.summarize();
        assert_eq!(summary.total_processed, 4);
        assert_eq!(summary.unique_count, 3);
        assert_eq!(summary.non_empty_text_count, 2);
        assert_eq!(aggregator.state().non_empty_text_counts().get("1"), Some(&1));
        assert!(!aggregator.state().non_empty_text_counts().contains_key("3"));
    }

    #[test]
    fn threshold_counts_strictly_more_than_five() {
        let mut aggregator = Aggregator::new();
        for (id, texts) in [("A", 6), ("B", 3), ("C", 7), ("D", 5)] {
            let batch = (0..texts).map(|_| record(id, "text")).collect::<Vec<_>>();
            aggregator.ingest(&batch);
        }
        assert_eq!(aggregator.summarize().ids_with_more_than_n_texts, 2);
    }

    proptest! {
        #[test]
        fn aggregation_invariants_hold(
            items in prop::collection::vec((0u8..20, any::<bool>()), 0..200)
        ) {
            let records = items
                .iter()
                .map(|(id, has_text)| record(&id.to_string(), if *has_text { "t" } else { "" }))
                .collect::<Vec<_>>();
            let mut aggregator = Aggregator::new();
            aggregator.ingest(&records);
            let state = aggregator.state();

            prop_assert_eq!(state.total_processed(), records.len() as u64);
            prop_assert!(state.unique_product_ids().len() as u64 <= state.total_processed());

            let texts = records.iter().filter(|r| r.has_text()).count() as u64;
            prop_assert_eq!(state.non_empty_text_counts().values().sum::<u64>(), texts);
            prop_assert_eq!(state.non_empty_text_total(), texts);
            for key in state.non_empty_text_counts().keys() {
                prop_assert!(state.unique_product_ids().contains(key));
            }
            prop_assert_eq!(state.csv_body().lines().count(), records.len() + 1);
        }
    }
}
