//! Storage abstraction trait
//!
//! This module defines the Storage trait that all object store backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use convoy_core::BlobHandle;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob handle: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage operation '{operation}' timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },
}

impl StorageError {
    /// The handle does not reference a stored blob. Retrying will not help.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object store capability
///
/// Handles are only valid after a successful `put`. Reading a handle that was
/// never written or has been deleted fails with `StorageError::NotFound`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under a fresh handle beneath `prefix` and return it.
    ///
    /// Never overwrites an existing blob.
    async fn put(
        &self,
        prefix: &str,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<BlobHandle>;

    /// Read the full contents of a blob
    async fn get(&self, handle: &BlobHandle) -> StorageResult<Vec<u8>>;

    /// Delete a blob. Deleting a missing blob succeeds.
    async fn delete(&self, handle: &BlobHandle) -> StorageResult<()>;

    /// Check if a blob exists
    async fn exists(&self, handle: &BlobHandle) -> StorageResult<bool>;

    /// Cheap connectivity probe
    async fn health_check(&self) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Bound a storage call by `limit`, mapping expiry to `StorageError::Timeout`.
pub async fn with_timeout<T, F>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout {
            operation,
            elapsed: limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_is_reported_with_operation() {
        let result: StorageResult<()> = with_timeout(Duration::from_millis(10), "get", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(StorageError::Timeout { operation, .. }) => assert_eq!(operation, "get"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn not_found_helper() {
        assert!(StorageError::NotFound("x".into()).is_not_found());
        assert!(!StorageError::DownloadFailed("x".into()).is_not_found());
    }
}
