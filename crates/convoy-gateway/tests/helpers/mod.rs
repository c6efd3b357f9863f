//! Shared fixtures for gateway integration tests.
//!
//! The app runs against in-memory storage and queue backends wrapped in call
//! counters, with a scripted identity service.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use bytes::Bytes;
use convoy_core::{BlobHandle, GatewayConfig, QueueBackend, StorageBackend};
use convoy_gateway::auth::{IdentityError, IdentityService};
use convoy_gateway::setup::routes::setup_routes;
use convoy_gateway::AppState;
use convoy_queue::{DeliveryStream, MemoryQueue, QueueResult, TaskQueue};
use convoy_storage::{MemoryStorage, Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const VALID_TOKEN: &str = "valid-token";
pub const OUTAGE_TOKEN: &str = "outage-token";
pub const TEST_SUBJECT: &str = "user@example.com";
pub const UPLOAD_TOPIC: &str = "upload";

/// Identity service that accepts `VALID_TOKEN`, fails on `OUTAGE_TOKEN` and
/// rejects everything else.
#[derive(Default)]
pub struct ScriptedIdentity;

#[async_trait]
impl IdentityService for ScriptedIdentity {
    async fn verify(&self, token: &str) -> Result<Option<String>, IdentityError> {
        match token {
            VALID_TOKEN => Ok(Some(TEST_SUBJECT.to_string())),
            OUTAGE_TOKEN => Err(IdentityError::Unavailable("connection refused".to_string())),
            _ => Err(IdentityError::Rejected("unknown token".to_string())),
        }
    }

    async fn login(&self, body: Bytes) -> Result<serde_json::Value, IdentityError> {
        let creds: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;
        match creds["password"].as_str() {
            Some("secret") => Ok(serde_json::json!({ "token": VALID_TOKEN })),
            Some("outage") => Err(IdentityError::Unavailable("timed out".to_string())),
            _ => Err(IdentityError::Rejected("invalid credentials".to_string())),
        }
    }
}

/// Counts every call that reaches the wrapped storage.
pub struct CountingStorage {
    pub inner: MemoryStorage,
    pub calls: AtomicUsize,
    pub unhealthy: AtomicBool,
}

#[async_trait]
impl Storage for CountingStorage {
    async fn put(
        &self,
        prefix: &str,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<BlobHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.put(prefix, filename, content_type, data).await
    }

    async fn get(&self, handle: &BlobHandle) -> StorageResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(handle).await
    }

    async fn delete(&self, handle: &BlobHandle) -> StorageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(handle).await
    }

    async fn exists(&self, handle: &BlobHandle) -> StorageResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(handle).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("bucket unreachable".to_string()));
        }
        self.inner.health_check().await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}

/// Counts every call that reaches the wrapped queue.
pub struct CountingQueue {
    pub inner: MemoryQueue,
    pub calls: AtomicUsize,
}

#[async_trait]
impl TaskQueue for CountingQueue {
    async fn publish(&self, topic: &str, payload: Bytes) -> QueueResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.publish(topic, payload).await
    }

    async fn consume(&self, topic: &str) -> QueueResult<DeliveryStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.consume(topic).await
    }

    async fn health_check(&self) -> QueueResult<()> {
        self.inner.health_check().await
    }

    fn backend_type(&self) -> QueueBackend {
        self.inner.backend_type()
    }
}

pub struct TestApp {
    pub client: TestServer,
    pub storage: Arc<CountingStorage>,
    pub queue: Arc<CountingQueue>,
}

impl TestApp {
    pub fn storage_calls(&self) -> usize {
        self.storage.calls.load(Ordering::SeqCst)
    }

    pub fn queue_calls(&self) -> usize {
        self.queue.calls.load(Ordering::SeqCst)
    }

    pub fn stored_blobs(&self) -> Vec<BlobHandle> {
        self.storage.inner.handles()
    }

    pub fn published_tasks(&self) -> Vec<Bytes> {
        self.queue.inner.ready_payloads(UPLOAD_TOPIC)
    }
}

pub fn test_config(max_upload_size_bytes: usize) -> GatewayConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("STORAGE_BACKEND", "memory"),
        ("QUEUE_BACKEND", "memory"),
        ("AUTH_SVC_URL", "http://identity.test"),
        ("UPLOAD_TOPIC", UPLOAD_TOPIC),
        ("STORAGE_TIMEOUT_SECS", "2"),
        ("QUEUE_TIMEOUT_SECS", "2"),
    ]);
    let mut config =
        GatewayConfig::from_vars(&|key| vars.get(key).map(|v| v.to_string())).unwrap();
    config.max_upload_size_bytes = max_upload_size_bytes;
    config
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_limit(1024 * 1024).await
}

pub async fn setup_test_app_with_limit(max_upload_size_bytes: usize) -> TestApp {
    let storage = Arc::new(CountingStorage {
        inner: MemoryStorage::new(),
        calls: AtomicUsize::new(0),
        unhealthy: AtomicBool::new(false),
    });
    let queue = Arc::new(CountingQueue {
        inner: MemoryQueue::new(),
        calls: AtomicUsize::new(0),
    });

    let state = Arc::new(AppState::new(
        test_config(max_upload_size_bytes),
        storage.clone(),
        queue.clone(),
        Arc::new(ScriptedIdentity),
    ));

    let app = setup_routes(state);
    let client = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        client,
        storage,
        queue,
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Multipart form carrying `data` in the `mp4File` field.
pub fn mp4_form(data: &[u8]) -> MultipartForm {
    let part = Part::bytes(Bytes::copy_from_slice(data))
        .file_name("clip.mp4")
        .mime_type("video/mp4");
    MultipartForm::new().add_part("mp4File", part)
}
