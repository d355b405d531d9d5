//! Lifecycle guarantees of submitted jobs, exercised end to end through
//! the dispatch front and the worker pool.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{PanickingSummarizer, RecordingProgress, TestHarness, UnavailableSummarizer};
use docintel::pipeline::ProgressEvent;
use docintel::stages::SUMMARY_FAILED_MARKER;
use docintel::{Department, JobStatus, Language};

const INVOICE: &str = "Invoice #INV-2024-001 dated 15/03/2024 amount ₹5,000.00. \
    Payment to the vendor is due within thirty days.";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn job_ids_are_unique_and_never_start_terminal() {
    let harness = TestHarness::new();
    let key = harness.put("invoice.txt", INVOICE);

    let mut ids = HashSet::new();
    for _ in 0..20 {
        let receipt = harness
            .dispatch
            .submit(TestHarness::request(&key))
            .await
            .unwrap();
        assert_eq!(receipt.status, JobStatus::Queued);
        assert!(ids.insert(receipt.job_id));
    }

    for id in &ids {
        let status = harness.ledger.status(id).await.unwrap().unwrap();
        if status.is_terminal() {
            // Only possible once a worker has run it
            let record = harness.ledger.get(id).await.unwrap().unwrap();
            assert!(record.updated_at >= record.created_at);
            assert!(record.result.is_some() || record.error.is_some());
        }
    }

    for id in &ids {
        assert_eq!(harness.wait_terminal(id).await.status, JobStatus::Completed);
    }
    assert_eq!(harness.ledger.queued_total().await.unwrap(), 20);
    harness.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_failure_ends_failed_without_result() {
    let harness = TestHarness::new();
    let job_id = harness
        .submit(TestHarness::request("uploads/never-uploaded.pdf"))
        .await;

    let record = harness.wait_terminal(&job_id).await;
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.result.is_none());
    let error = record.error.unwrap();
    assert!(!error.is_empty());
    assert!(error.starts_with("Failed to fetch document"));
    harness.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsupported_format_fails_the_job() {
    let harness = TestHarness::new();
    let record = harness.process("ledger.xlsx", "not really a spreadsheet").await;

    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.error.unwrap().contains("xlsx"));
    harness.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_job_carries_full_record() {
    let harness = TestHarness::new();
    let record = harness.process("invoice.txt", INVOICE).await;

    assert_eq!(record.status, JobStatus::Completed);
    assert!(record.error.is_none());
    let result = record.result.unwrap();

    assert_eq!(result.department, Department::Finance);
    assert_eq!(result.language, Language::English);
    assert_eq!(result.metadata["invoice_number"], "INV-2024-001");
    assert_eq!(result.metadata["date"], "15/03/2024");
    assert_eq!(result.metadata["amount"], "5,000.00");
    assert!(!result.metadata.contains_key("po_number"));
    assert!(!result.metadata.contains_key("train_number"));
    assert_eq!(
        result.summary.keys().copied().collect::<Vec<_>>(),
        Language::ALL.to_vec()
    );
    harness.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn summarizer_outage_still_completes() {
    let harness = TestHarness::builder()
        .summarizer(Arc::new(UnavailableSummarizer))
        .build();
    let record = harness.process("invoice.txt", INVOICE).await;

    assert_eq!(record.status, JobStatus::Completed);
    let result = record.result.unwrap();
    assert_eq!(result.summary[&Language::English], SUMMARY_FAILED_MARKER);
    assert_eq!(result.summary[&Language::Malayalam], SUMMARY_FAILED_MARKER);
    assert_eq!(result.summary_text, SUMMARY_FAILED_MARKER);
    assert_eq!(result.processing_metadata.model_versions["summarizer"], "unavailable");
    harness.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_stage_fails_only_its_job() {
    let harness = TestHarness::builder()
        .summarizer(Arc::new(PanickingSummarizer))
        .workers(1)
        .build();

    let first = harness.process("invoice.txt", INVOICE).await;
    assert_eq!(first.status, JobStatus::Failed);
    assert!(first.error.unwrap().contains("panicked"));

    // The worker survived and keeps draining the queue
    let second = harness
        .submit(TestHarness::request("uploads/missing.txt"))
        .await;
    assert_eq!(harness.wait_terminal(&second).await.status, JobStatus::Failed);
    harness.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queries_are_idempotent() {
    let harness = TestHarness::new();
    let record = harness.process("invoice.txt", INVOICE).await;

    let first = harness.dispatch.result(&record.id).await.unwrap();
    let second = harness.dispatch.result(&record.id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_ref(), Some(&record));

    let status_a = harness.dispatch.status(&record.id).await.unwrap();
    let status_b = harness.dispatch.status(&record.id).await.unwrap();
    assert_eq!(status_a, status_b);
    harness.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn expired_job_reads_as_unknown() {
    let harness = TestHarness::builder()
        .ttl(Duration::from_millis(200))
        .build();
    let record = harness.process("invoice.txt", INVOICE).await;

    tokio::time::sleep(Duration::from_millis(500)).await;

    let expired = harness.dispatch.status(&record.id).await.unwrap();
    let never = harness.dispatch.status("never-issued").await.unwrap();
    assert_eq!(expired.job_id, record.id);
    assert_eq!(expired.status, None);
    assert_eq!(never.status, None);
    assert!(harness.dispatch.result(&record.id).await.unwrap().is_none());
    harness.pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn terminal_events_are_reported_once() {
    let progress = Arc::new(RecordingProgress::default());
    let harness = TestHarness::builder().progress(progress.clone()).build();

    let ok = harness.process("invoice.txt", INVOICE).await;
    let missing = harness
        .submit(TestHarness::request("uploads/missing.png"))
        .await;
    harness.wait_terminal(&missing).await;
    harness.pool.shutdown().await;

    let events = progress.terminal_events();
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .any(|(id, e)| id == &ok.id && matches!(e, ProgressEvent::Completed { .. })));
    assert!(events
        .iter()
        .any(|(id, e)| id == &missing && matches!(e, ProgressEvent::Failed { .. })));
}
