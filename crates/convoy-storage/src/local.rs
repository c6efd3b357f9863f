use crate::keys::{generate_storage_key, validate_key};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use convoy_core::BlobHandle;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for blob storage (e.g., "/var/lib/convoy/blobs")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert a blob handle to a filesystem path with security validation
    ///
    /// Rejects handles containing path traversal sequences that could escape
    /// the base storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if !validate_key(storage_key) {
            return Err(StorageError::InvalidKey(
                "Blob handle contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Blob handle resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Progress of one blob write, shared by `put` and its blocking write
#[derive(Debug, Default)]
struct WriteState {
    /// The caller gave up; the write must not become visible
    cancelled: bool,
    /// The blob was renamed into place
    committed: bool,
}

/// Removes the blob of a `put` that is dropped before returning its handle.
struct PendingPut {
    state: Arc<Mutex<WriteState>>,
    path: PathBuf,
    armed: bool,
}

impl Drop for PendingPut {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.cancelled = true;
        if state.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(error = %e, path = %self.path.display(), "Failed to remove abandoned blob");
            }
        }
    }
}

/// `videos/abc-clip.mp4` -> `videos/.abc-clip.mp4.partial`
fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

/// Write `data` to `partial`, then rename it to `path` unless the put was
/// cancelled. On any failure the partial file is removed.
fn write_blob(partial: &Path, path: &Path, data: &[u8], state: &Mutex<WriteState>) -> io::Result<()> {
    let result = write_partial(partial, data).and_then(|()| {
        let mut state = state
            .lock()
            .map_err(|_| io::Error::other("write state lock poisoned"))?;
        if state.cancelled {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "put cancelled"));
        }
        std::fs::rename(partial, path)?;
        state.committed = true;
        Ok(())
    });

    if result.is_err() {
        let _ = std::fs::remove_file(partial);
    }
    result
}

fn write_partial(partial: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(partial)?;
    file.write_all(data)?;
    file.sync_all()
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(
        &self,
        prefix: &str,
        filename: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<BlobHandle> {
        let key = generate_storage_key(prefix, filename);
        let path = self.key_to_path(&key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let state = Arc::new(Mutex::new(WriteState::default()));
        let mut guard = PendingPut {
            state: Arc::clone(&state),
            path: path.clone(),
            armed: true,
        };

        let partial = partial_path(&path);
        let target = path.clone();
        let written =
            tokio::task::spawn_blocking(move || write_blob(&partial, &target, &data, &state))
                .await
                .map_err(|e| StorageError::UploadFailed(format!("Write task failed: {}", e)))?;

        written.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        guard.armed = false;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(BlobHandle::new(key))
    }

    async fn get(&self, handle: &BlobHandle) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(handle.as_str())?;
        let start = std::time::Instant::now();

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(handle.to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to read file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::info!(
            path = %path.display(),
            key = %handle,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage get successful"
        );

        Ok(data)
    }

    async fn delete(&self, handle: &BlobHandle) -> StorageResult<()> {
        let path = self.key_to_path(handle.as_str())?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        tracing::info!(
            path = %path.display(),
            key = %handle,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, handle: &BlobHandle) -> StorageResult<bool> {
        let path = self.key_to_path(handle.as_str())?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.base_path).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Storage directory {} unavailable: {}",
                self.base_path.display(),
                e
            ))
        })?;
        if meta.permissions().readonly() {
            return Err(StorageError::BackendError(format!(
                "Storage directory {} is read-only",
                self.base_path.display()
            )));
        }
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
