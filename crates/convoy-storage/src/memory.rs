//! In-process object store.
//!
//! Blobs live in a map behind a mutex. Useful for tests and for running the
//! gateway and worker inside one process. Fault switches let tests exercise
//! the transient-failure paths of callers.

use crate::keys::{generate_storage_key, validate_key};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use convoy_core::BlobHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct FaultSwitches {
    put: AtomicBool,
    get: AtomicBool,
    delete: AtomicBool,
}

/// Object store that keeps every blob in memory
#[derive(Clone, Default)]
pub struct MemoryStorage {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    faults: Arc<FaultSwitches>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> StorageResult<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| StorageError::BackendError("memory store lock poisoned".to_string()))
    }

    /// Store bytes under an exact handle, bypassing handle generation.
    pub fn insert(&self, handle: &BlobHandle, data: Vec<u8>) -> StorageResult<()> {
        self.blobs()?.insert(handle.as_str().to_string(), data);
        Ok(())
    }

    /// Handles currently stored, sorted.
    pub fn handles(&self) -> Vec<BlobHandle> {
        let mut handles: Vec<BlobHandle> = match self.blobs() {
            Ok(blobs) => blobs.keys().map(|k| BlobHandle::new(k.clone())).collect(),
            Err(_) => Vec::new(),
        };
        handles.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        handles
    }

    /// Number of stored blobs whose handle starts with `prefix`.
    pub fn count_with_prefix(&self, prefix: &str) -> usize {
        self.handles()
            .iter()
            .filter(|h| h.as_str().starts_with(prefix))
            .count()
    }

    /// Make every subsequent `put` fail with `UploadFailed`.
    pub fn fail_puts(&self, fail: bool) {
        self.faults.put.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `get` fail with `DownloadFailed`.
    pub fn fail_gets(&self, fail: bool) {
        self.faults.get.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete` fail with `DeleteFailed`.
    pub fn fail_deletes(&self, fail: bool) {
        self.faults.delete.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(
        &self,
        prefix: &str,
        filename: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<BlobHandle> {
        if self.faults.put.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(
                "memory store rejecting writes".to_string(),
            ));
        }

        let key = generate_storage_key(prefix, filename);
        let size = data.len();
        self.blobs()?.insert(key.clone(), data);

        tracing::debug!(key = %key, size_bytes = size, "Memory storage put successful");

        Ok(BlobHandle::new(key))
    }

    async fn get(&self, handle: &BlobHandle) -> StorageResult<Vec<u8>> {
        if !validate_key(handle.as_str()) {
            return Err(StorageError::InvalidKey(handle.to_string()));
        }
        if self.faults.get.load(Ordering::SeqCst) {
            return Err(StorageError::DownloadFailed(
                "memory store rejecting reads".to_string(),
            ));
        }

        self.blobs()?
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound(handle.to_string()))
    }

    async fn delete(&self, handle: &BlobHandle) -> StorageResult<()> {
        if !validate_key(handle.as_str()) {
            return Err(StorageError::InvalidKey(handle.to_string()));
        }
        if self.faults.delete.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(
                "memory store rejecting deletes".to_string(),
            ));
        }

        if self.blobs()?.remove(handle.as_str()).is_some() {
            tracing::debug!(key = %handle, "Memory storage delete successful");
        }
        Ok(())
    }

    async fn exists(&self, handle: &BlobHandle) -> StorageResult<bool> {
        if !validate_key(handle.as_str()) {
            return Err(StorageError::InvalidKey(handle.to_string()));
        }
        Ok(self.blobs()?.contains_key(handle.as_str()))
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.blobs().map(|_| ())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_contract() {
        let storage = MemoryStorage::new();

        let handle = storage
            .put("videos", "clip.mp4", "video/mp4", b"0123456789".to_vec())
            .await
            .unwrap();
        assert!(storage.exists(&handle).await.unwrap());
        assert_eq!(storage.get(&handle).await.unwrap(), b"0123456789");

        storage.delete(&handle).await.unwrap();
        storage.delete(&handle).await.unwrap();
        assert!(storage.get(&handle).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn fault_switches() {
        let storage = MemoryStorage::new();
        let handle = storage
            .put("videos", "a.mp4", "video/mp4", b"a".to_vec())
            .await
            .unwrap();

        storage.fail_gets(true);
        let err = storage.get(&handle).await.unwrap_err();
        assert!(matches!(err, StorageError::DownloadFailed(_)));
        storage.fail_gets(false);
        assert!(storage.get(&handle).await.is_ok());

        storage.fail_puts(true);
        assert!(storage
            .put("videos", "b.mp4", "video/mp4", b"b".to_vec())
            .await
            .is_err());
        assert_eq!(storage.count_with_prefix("videos/"), 1);
    }

    #[tokio::test]
    async fn clones_share_blobs() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        let handle = storage
            .put("mp3", "x.mp3", "audio/mpeg", b"x".to_vec())
            .await
            .unwrap();
        assert!(other.exists(&handle).await.unwrap());
        assert_eq!(other.handles(), vec![handle]);
    }
}
