mod helpers;

use bytes::Bytes;
use convoy_core::{BlobHandle, ConversionStatus};
use convoy_queue::{Delivery, TaskQueue};
use convoy_storage::Storage;
use convoy_worker::TaskState;
use futures::StreamExt;
use helpers::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn next_delivery(harness: &Harness) -> Delivery {
    let mut stream = harness.queue.consume(UPLOAD_TOPIC).await.unwrap();
    stream.next().await.unwrap().unwrap()
}

async fn handle_next(harness: &Harness) -> TaskState {
    let delivery = next_delivery(harness).await;
    harness.worker.handle_delivery(delivery).await
}

#[tokio::test]
async fn test_task_is_converted_and_acked() {
    let harness = Harness::new();
    let task = harness.submit(b"0123456789").await;

    assert_eq!(handle_next(&harness).await, TaskState::Published);

    let results = harness.results();
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.status(), ConversionStatus::Succeeded);
    assert_eq!(result.source_blob_id(), &task.source_blob_id);
    assert_eq!(result.owner_identity(), "user@example.com");
    assert!(result.result_blob_id().as_str().starts_with("mp3/"));
    assert!(result.result_blob_id().as_str().ends_with("clip.mp3"));

    let audio = harness.storage.get(result.result_blob_id()).await.unwrap();
    assert_eq!(audio, b"ID30123456789".to_vec());

    assert_eq!(harness.queue.ready_count(UPLOAD_TOPIC), 0);
    assert_eq!(harness.queue.in_flight_count(UPLOAD_TOPIC), 0);
}

#[tokio::test]
async fn test_source_blob_is_kept() {
    let harness = Harness::new();
    let task = harness.submit(b"0123456789").await;

    handle_next(&harness).await;

    assert!(harness.storage.exists(&task.source_blob_id).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_delivery_produces_independent_results() {
    let harness = Harness::new();
    let task = harness.submit(b"0123456789").await;
    harness
        .publish_task(task.source_blob_id.clone(), task.size_bytes)
        .await;

    assert_eq!(handle_next(&harness).await, TaskState::Published);
    assert_eq!(handle_next(&harness).await, TaskState::Published);

    let results = harness.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].source_blob_id(), results[1].source_blob_id());
    assert_ne!(results[0].result_blob_id(), results[1].result_blob_id());
    assert_eq!(harness.result_blob_count(), 2);
}

#[tokio::test]
async fn test_missing_source_publishes_failed_result() {
    let harness = Harness::new();
    harness
        .publish_task(BlobHandle::new("videos/missing-clip.mp4"), 10)
        .await;

    assert_eq!(handle_next(&harness).await, TaskState::Failed);

    let results = harness.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), ConversionStatus::Failed);
    assert!(results[0].result_blob_id().is_empty());
    assert!(results[0].error_detail().unwrap().contains("not found"));
    assert_eq!(harness.converter.calls.load(Ordering::SeqCst), 0);

    // The worker keeps going after a failed task
    harness.submit(b"0123456789").await;
    assert_eq!(handle_next(&harness).await, TaskState::Published);
    assert_eq!(harness.results().len(), 2);
}

#[tokio::test]
async fn test_invalid_source_handle_is_not_redelivered() {
    let harness = Harness::new();
    harness
        .publish_task(BlobHandle::new("../etc/passwd"), 10)
        .await;

    assert_eq!(handle_next(&harness).await, TaskState::Failed);

    let results = harness.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), ConversionStatus::Failed);
    assert!(results[0].error_detail().unwrap().contains("invalid"));
    assert_eq!(harness.queue.ready_count(UPLOAD_TOPIC), 0);
    assert_eq!(harness.queue.in_flight_count(UPLOAD_TOPIC), 0);
}

#[tokio::test]
async fn test_process_reports_the_failing_stage() {
    let harness = Harness::new();

    let missing = harness
        .publish_task(BlobHandle::new("videos/missing-clip.mp4"), 10)
        .await;
    let err = harness.worker.process(&missing).await.unwrap_err();
    assert_eq!(err.stage, TaskState::Fetching);
    assert!(!err.error.is_recoverable());

    let corrupt = harness.submit(b"corrupt mp4 bytes").await;
    let err = harness.worker.process(&corrupt).await.unwrap_err();
    assert_eq!(err.stage, TaskState::Converting);
    assert!(!err.error.is_recoverable());

    harness.storage.fail_gets(true);
    let good = harness.submit(b"0123456789").await;
    let err = harness.worker.process(&good).await.unwrap_err();
    assert_eq!(err.stage, TaskState::Fetching);
    assert!(err.error.is_recoverable());
}

#[tokio::test]
async fn test_conversion_failure_is_published_and_acked() {
    let harness = Harness::new();
    harness.submit(b"corrupt mp4 bytes").await;

    assert_eq!(handle_next(&harness).await, TaskState::Failed);

    let results = harness.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), ConversionStatus::Failed);
    assert!(results[0].error_detail().unwrap().contains("invalid data"));
    assert_eq!(harness.result_blob_count(), 0);
    assert_eq!(harness.queue.ready_count(UPLOAD_TOPIC), 0);
    assert_eq!(harness.queue.in_flight_count(UPLOAD_TOPIC), 0);
}

#[tokio::test]
async fn test_conversion_timeout_is_a_failed_result() {
    let mut config = test_config(1);
    config.conversion_timeout = Duration::from_millis(50);
    let harness = Harness::with(config, FakeConverter::slow(Duration::from_secs(2)));
    harness.submit(b"0123456789").await;

    assert_eq!(handle_next(&harness).await, TaskState::Failed);

    let results = harness.results();
    assert_eq!(results.len(), 1);
    assert!(results[0].error_detail().unwrap().contains("timed out"));
    assert_eq!(harness.result_blob_count(), 0);
}

#[tokio::test]
async fn test_transient_fetch_failure_releases_delivery() {
    let harness = Harness::new();
    harness.submit(b"0123456789").await;
    harness.storage.fail_gets(true);

    assert_eq!(handle_next(&harness).await, TaskState::Released);

    assert!(harness.results().is_empty());
    assert_eq!(harness.queue.ready_count(UPLOAD_TOPIC), 1);
    assert_eq!(harness.queue.in_flight_count(UPLOAD_TOPIC), 0);

    // Redelivered once the store recovers
    harness.storage.fail_gets(false);
    let delivery = next_delivery(&harness).await;
    assert_eq!(delivery.delivery_count, 2);
    assert_eq!(
        harness.worker.handle_delivery(delivery).await,
        TaskState::Published
    );
}

#[tokio::test]
async fn test_result_store_failure_releases_delivery() {
    let harness = Harness::new();
    harness.submit(b"0123456789").await;
    harness.storage.fail_puts(true);

    assert_eq!(handle_next(&harness).await, TaskState::Released);

    assert!(harness.results().is_empty());
    assert_eq!(harness.result_blob_count(), 0);
    assert_eq!(harness.queue.ready_count(UPLOAD_TOPIC), 1);
}

#[tokio::test]
async fn test_result_publish_failure_removes_result_blob() {
    let harness = Harness::new();
    harness.submit(b"0123456789").await;
    harness.queue.fail_publishes_to(RESULT_TOPIC, true);

    assert_eq!(handle_next(&harness).await, TaskState::Released);

    assert_eq!(harness.result_blob_count(), 0);
    assert!(harness.results().is_empty());
    assert_eq!(harness.queue.ready_count(UPLOAD_TOPIC), 1);
    assert_eq!(harness.queue.in_flight_count(UPLOAD_TOPIC), 0);
}

#[tokio::test]
async fn test_undecodable_task_is_discarded() {
    let harness = Harness::new();
    harness
        .queue
        .publish(UPLOAD_TOPIC, Bytes::from_static(b"{not json"))
        .await
        .unwrap();

    assert_eq!(handle_next(&harness).await, TaskState::Discarded);

    assert!(harness.results().is_empty());
    assert_eq!(harness.queue.ready_count(UPLOAD_TOPIC), 0);
    assert_eq!(harness.queue.in_flight_count(UPLOAD_TOPIC), 0);
}

#[tokio::test]
async fn test_run_processes_until_cancelled() {
    let harness = Harness::new();
    for _ in 0..3 {
        harness.submit(b"0123456789").await;
    }

    let shutdown = CancellationToken::new();
    let run = tokio::spawn(Arc::clone(&harness.worker).run(shutdown.clone()));

    wait_until(|| harness.queue.ready_count(RESULT_TOPIC) == 3).await;
    shutdown.cancel();

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.published, 3);
    assert_eq!(summary.total(), 3);
    assert_eq!(harness.queue.in_flight_count(UPLOAD_TOPIC), 0);
}

#[tokio::test]
async fn test_run_continues_past_failed_tasks() {
    let harness = Harness::with(test_config(1), FakeConverter::default());
    harness.submit(b"0123456789").await;
    harness
        .publish_task(BlobHandle::new("videos/missing-clip.mp4"), 10)
        .await;
    harness.submit(b"9876543210").await;

    let shutdown = CancellationToken::new();
    let run = tokio::spawn(Arc::clone(&harness.worker).run(shutdown.clone()));

    wait_until(|| harness.queue.ready_count(RESULT_TOPIC) == 3).await;
    shutdown.cancel();

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.published, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.released, 0);

    let statuses: Vec<ConversionStatus> = harness.results().iter().map(|r| r.status()).collect();
    assert_eq!(
        statuses,
        vec![
            ConversionStatus::Succeeded,
            ConversionStatus::Failed,
            ConversionStatus::Succeeded
        ]
    );
    assert_eq!(harness.queue.ready_count(UPLOAD_TOPIC), 0);
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_tasks() {
    let harness = Harness::with(
        test_config(2),
        FakeConverter::slow(Duration::from_millis(500)),
    );
    for _ in 0..3 {
        harness.submit(b"0123456789").await;
    }

    let shutdown = CancellationToken::new();
    let run = tokio::spawn(Arc::clone(&harness.worker).run(shutdown.clone()));

    // Two tasks hold the only permits; the third is never pulled
    wait_until(|| harness.converter.calls.load(Ordering::SeqCst) == 2).await;
    shutdown.cancel();

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.published, 2);
    assert_eq!(harness.results().len(), 2);
    assert_eq!(harness.queue.in_flight_count(UPLOAD_TOPIC), 0);
    assert_eq!(harness.queue.ready_count(UPLOAD_TOPIC), 1);
}

#[tokio::test]
async fn test_run_stops_when_stream_ends() {
    let harness = Harness::new();
    harness.submit(b"0123456789").await;

    let run = tokio::spawn(Arc::clone(&harness.worker).run(CancellationToken::new()));

    wait_until(|| harness.queue.ready_count(RESULT_TOPIC) == 1).await;
    harness.queue.close();

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("worker did not stop after the stream ended")
        .unwrap()
        .unwrap();
    assert_eq!(summary.published, 1);
}
