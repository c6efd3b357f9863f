//! Shared fixtures for worker tests: in-memory backends and scripted converters.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use convoy_core::{BlobHandle, ConversionResult, Identity, UploadTask, WorkerConfig};
use convoy_queue::{MemoryQueue, TaskQueue};
use convoy_storage::{MemoryStorage, Storage};
use convoy_worker::{ConversionError, ConversionWorker, ConvertedArtifact, Converter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const UPLOAD_TOPIC: &str = "upload";
pub const RESULT_TOPIC: &str = "converted";
pub const MP3_HEADER: &[u8] = b"ID3";

/// Prefixes the input with an MP3 tag header. Inputs starting with
/// `corrupt` fail to convert.
#[derive(Default)]
pub struct FakeConverter {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeConverter {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Converter for FakeConverter {
    async fn convert(
        &self,
        task: &UploadTask,
        input: Vec<u8>,
    ) -> Result<ConvertedArtifact, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if input.starts_with(b"corrupt") {
            return Err(ConversionError::Failed("invalid data found when processing input".to_string()));
        }
        let mut data = MP3_HEADER.to_vec();
        data.extend_from_slice(&input);
        Ok(ConvertedArtifact::mp3(task, data))
    }
}

pub struct Harness {
    pub storage: MemoryStorage,
    pub queue: MemoryQueue,
    pub converter: Arc<FakeConverter>,
    pub worker: Arc<ConversionWorker>,
}

pub fn test_config(concurrency: usize) -> WorkerConfig {
    let concurrency = concurrency.to_string();
    let vars: HashMap<&str, &str> = HashMap::from([
        ("STORAGE_BACKEND", "memory"),
        ("QUEUE_BACKEND", "memory"),
        ("UPLOAD_TOPIC", UPLOAD_TOPIC),
        ("RESULT_TOPIC", RESULT_TOPIC),
        ("STORAGE_TIMEOUT_SECS", "2"),
        ("QUEUE_TIMEOUT_SECS", "2"),
        ("WORKER_CONCURRENCY", concurrency.as_str()),
        ("CONVERSION_TIMEOUT_SECS", "5"),
    ]);
    WorkerConfig::from_vars(&|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        Self::with(test_config(4), FakeConverter::default())
    }

    pub fn with(config: WorkerConfig, converter: FakeConverter) -> Self {
        let storage = MemoryStorage::new();
        let queue = MemoryQueue::new();
        let converter = Arc::new(converter);
        let worker = Arc::new(ConversionWorker::new(
            config,
            Arc::new(storage.clone()),
            Arc::new(queue.clone()),
            converter.clone(),
        ));
        Self {
            storage,
            queue,
            converter,
            worker,
        }
    }

    /// Store `data` as a source blob and publish the task that references it.
    pub async fn submit(&self, data: &[u8]) -> UploadTask {
        let handle = self
            .storage
            .put("videos", "clip.mp4", "video/mp4", data.to_vec())
            .await
            .unwrap();
        self.publish_task(handle, data.len() as i64).await
    }

    /// Publish a task for `handle` without touching storage.
    pub async fn publish_task(&self, handle: BlobHandle, size_bytes: i64) -> UploadTask {
        let task = UploadTask::new(
            handle,
            "clip.mp4",
            size_bytes,
            &Identity::new("user@example.com"),
        );
        self.queue
            .publish(UPLOAD_TOPIC, Bytes::from(task.encode().unwrap()))
            .await
            .unwrap();
        task
    }

    pub fn results(&self) -> Vec<ConversionResult> {
        self.queue
            .ready_payloads(RESULT_TOPIC)
            .iter()
            .map(|payload| ConversionResult::decode(payload).unwrap())
            .collect()
    }

    pub fn result_blob_count(&self) -> usize {
        self.storage.count_with_prefix("mp3/")
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
