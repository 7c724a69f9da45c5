//! End-to-end behaviour of the fetch pipeline over a scripted source
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rstest::rstest;

use feedback_harvester_lib::domain::constants::storage::CSV_DATA_KEY;
use feedback_harvester_lib::infrastructure::{
    KeyValueStore, MemoryKeyValueStore, ProgressPersistence, StorageError,
};
use feedback_harvester_lib::pipeline::SchedulerConfig;
use feedback_harvester_lib::test_utils::{ScriptedSource, sample_records};
use feedback_harvester_lib::{
    BatchScheduler, FeedbackQuery, FetchError, FetchTarget, RunOrchestrator, RunRequest, RunStatus,
};

/// Memory store that counts checkpoint writes and can start failing them
#[derive(Default)]
struct CountingStore {
    inner: MemoryKeyValueStore,
    csv_writes: AtomicUsize,
    fail_after: Option<usize>,
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if key == CSV_DATA_KEY {
            let writes = self.csv_writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| writes >= limit) {
                return Err(StorageError::Io {
                    path: PathBuf::from(key),
                    source: std::io::Error::other("disk full"),
                });
            }
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
}

fn scheduler_config(limit: usize) -> SchedulerConfig {
    SchedulerConfig {
        concurrency_limit: limit,
        inter_request_delay: Duration::ZERO,
        retry_attempts: 0,
        retry_backoff: Duration::ZERO,
    }
}

fn orchestrator(
    source: ScriptedSource,
    store: Arc<CountingStore>,
    group_size: usize,
) -> RunOrchestrator {
    RunOrchestrator::from_parts(
        BatchScheduler::new(Arc::new(source), scheduler_config(3)),
        ProgressPersistence::new(store),
        5000,
        group_size,
    )
}

fn request(identifiers: &str) -> RunRequest {
    RunRequest {
        api_key: "secret".to_string(),
        lookback_days: 35,
        identifiers: identifiers.to_string(),
    }
}

fn position(log: &[String], needle: &str) -> usize {
    log.iter()
        .position(|line| line.contains(needle))
        .unwrap_or_else(|| panic!("no log line contains {needle:?}: {log:#?}"))
}

#[tokio::test]
async fn failing_identifier_does_not_affect_siblings() {
    let source = ScriptedSource::new()
        .with_pages(Some("A"), vec![sample_records("A", 4), sample_records("A", 2)])
        .with_failure(
            Some("B"),
            FetchError::Network("HTTP request failed with status 500".to_string()),
        )
        .with_pages(Some("C"), vec![sample_records("C", 3)]);

    let report = orchestrator(source, Arc::default(), 1000)
        .run(&request("A, B, C"))
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.summary.total_processed, 9);
    assert_eq!(report.summary.unique_count, 2);
    assert_eq!(
        report.failures,
        vec!["Failed to fetch feedback for nmId B: Network error: HTTP request failed with status 500"]
    );
    assert!(report.log.iter().any(|l| l.contains("nmId B") && l.contains("500")));
    assert_eq!(report.log.last().map(String::as_str), Some("Failures: 1"));

    let products: Vec<String> = csv::Reader::from_reader(report.csv_body.as_bytes())
        .records()
        .map(|row| row.unwrap()[0].to_string())
        .collect();
    assert_eq!(products.iter().filter(|p| **p == "A").count(), 6);
    assert_eq!(products.iter().filter(|p| **p == "C").count(), 3);
    assert!(!products.iter().any(|p| p == "B"));
}

#[tokio::test]
async fn pagination_offsets_follow_page_lengths() {
    let source = Arc::new(ScriptedSource::new().with_pages(
        Some("7"),
        vec![sample_records("7", 5), sample_records("7", 5), sample_records("7", 2)],
    ));
    let scheduler = BatchScheduler::new(source.clone(), scheduler_config(1));

    let outcome = scheduler
        .run_batch(
            vec![FetchTarget::Product("7".to_string())],
            &FeedbackQuery::for_lookback(35, 5, chrono::Utc::now()).unwrap(),
            "secret",
            |_| {},
        )
        .await;

    assert_eq!(outcome.records.len(), 12);
    let offsets = source.calls_for(Some("7"));
    assert_eq!(offsets, vec![0, 5, 10, 12]);
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
}

#[rstest]
#[case(1, 4)]
#[case(3, 7)]
#[case(5, 12)]
#[tokio::test(start_paused = true)]
async fn never_exceeds_the_concurrency_limit(#[case] limit: usize, #[case] identifiers: usize) {
    let mut source = ScriptedSource::new().with_latency(Duration::from_millis(100));
    let targets: Vec<FetchTarget> = (0..identifiers)
        .map(|i| FetchTarget::Product(i.to_string()))
        .collect();
    for i in 0..identifiers {
        let id = i.to_string();
        source = source.with_pages(Some(id.as_str()), vec![sample_records(&id, 2)]);
    }
    let source = Arc::new(source);
    let scheduler = BatchScheduler::new(source.clone(), scheduler_config(limit));

    let mut done = 0;
    let outcome = scheduler
        .run_batch(
            targets,
            &FeedbackQuery::for_lookback(35, 5000, chrono::Utc::now()).unwrap(),
            "secret",
            |_| done += 1,
        )
        .await;

    assert_eq!(done, identifiers);
    assert_eq!(outcome.records.len(), identifiers * 2);
    assert!(outcome.failures.is_empty());
    assert_eq!(source.max_in_flight(), limit);
}

#[tokio::test(start_paused = true)]
async fn each_claimed_identifier_waits_the_inter_request_delay() {
    let mut source = ScriptedSource::new();
    for id in ["1", "2", "3", "4", "5", "6"] {
        source = source.with_pages(Some(id), vec![sample_records(id, 1)]);
    }
    let scheduler = BatchScheduler::new(
        Arc::new(source),
        SchedulerConfig {
            inter_request_delay: Duration::from_millis(350),
            ..scheduler_config(3)
        },
    );

    let started = tokio::time::Instant::now();
    let outcome = scheduler
        .run_batch(
            ["1", "2", "3", "4", "5", "6"]
                .iter()
                .map(|id| FetchTarget::Product((*id).to_string()))
                .collect(),
            &FeedbackQuery::for_lookback(35, 5000, chrono::Utc::now()).unwrap(),
            "secret",
            |_| {},
        )
        .await;

    assert_eq!(outcome.records.len(), 6);
    // three workers, two identifiers each
    assert!(started.elapsed() >= Duration::from_millis(700));
}

#[tokio::test]
async fn groups_run_in_order_with_a_checkpoint_each() {
    let mut source = ScriptedSource::new();
    for id in ["1", "2", "3", "4", "5"] {
        source = source.with_pages(Some(id), vec![sample_records(id, 2)]);
    }
    let store = Arc::new(CountingStore::default());

    let report = orchestrator(source, store.clone(), 2)
        .run(&request("1,2,3,4,5"))
        .await;

    assert!(report.is_completed());
    // three groups plus the final summary checkpoint
    assert_eq!(store.csv_writes.load(Ordering::SeqCst), 4);

    let log = &report.log;
    assert!(position(log, "✅ nmId 1") < position(log, "Group 2/3"));
    assert!(position(log, "✅ nmId 2") < position(log, "Group 2/3"));
    assert!(position(log, "✅ nmId 4") < position(log, "Group 3/3"));
    assert!(position(log, "Group 3/3") < position(log, "✅ nmId 5"));

    let saved = ProgressPersistence::new(store)
        .load_last_checkpoint()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.log, report.log);
    assert_eq!(saved.csv_body, report.csv_body);
}

#[tokio::test]
async fn checkpoint_failure_aborts_the_run() {
    let mut source = ScriptedSource::new();
    for id in ["1", "2", "3"] {
        source = source.with_pages(Some(id), vec![sample_records(id, 1)]);
    }
    let store = Arc::new(CountingStore {
        fail_after: Some(1),
        ..CountingStore::default()
    });

    let report = orchestrator(source, store.clone(), 1)
        .run(&request("1,2,3"))
        .await;

    assert!(matches!(report.status, RunStatus::Aborted(_)));
    let last = report.log.last().unwrap();
    assert!(last.starts_with("Run aborted: "), "{last}");
    assert!(last.contains("disk full"));
    assert_eq!(
        report.log.iter().filter(|l| l.starts_with("Run aborted")).count(),
        1
    );
    assert!(!report.log.iter().any(|l| l.contains("Group 3/3")));

    // the first group's checkpoint is what survives
    let saved = ProgressPersistence::new(store)
        .load_last_checkpoint()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.csv_body.lines().count(), 2);
    assert!(saved.log.iter().any(|l| l.contains("✅ nmId 1")));
}

#[tokio::test]
async fn new_run_discards_stale_progress() {
    let store = Arc::new(CountingStore::default());
    ProgressPersistence::new(store.clone())
        .checkpoint("stale", &["old line".to_string()])
        .await
        .unwrap();

    let source = ScriptedSource::new().with_pages(Some("1"), vec![sample_records("1", 1)]);
    let report = orchestrator(source, store.clone(), 10).run(&request("1")).await;

    assert!(report.is_completed());
    assert!(!report.log.iter().any(|l| l == "old line"));
    let saved = ProgressPersistence::new(store)
        .load_last_checkpoint()
        .await
        .unwrap()
        .unwrap();
    assert!(!saved.csv_body.contains("stale"));
}
