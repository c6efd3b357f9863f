//! Upload admission
//!
//! Pipeline: read the multipart file -> store the blob -> publish the task.
//! A blob is never left behind without a task referencing it: when the
//! publish fails the blob is deleted before the error is returned.

use crate::state::AppState;
use axum::extract::Multipart;
use bytes::Bytes;
use convoy_core::constants::UPLOAD_FIELD_NAME;
use convoy_core::{AppError, BlobHandle, Identity, UploadTask};
use convoy_queue::with_timeout as queue_timeout;
use convoy_storage::with_timeout as storage_timeout;
use serde::Serialize;
use std::sync::Arc;

const DEFAULT_FILENAME: &str = "upload.mp4";
const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// File part pulled out of an upload request
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Body of a successful upload response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAccepted {
    pub blob_id: String,
    pub status: &'static str,
}

impl UploadAccepted {
    fn new(blob_id: &BlobHandle) -> Self {
        Self {
            blob_id: blob_id.to_string(),
            status: "accepted",
        }
    }
}

/// Extract the upload file from the multipart form.
///
/// The file is read chunk by chunk and rejected as soon as it grows past
/// `max_size`. Exactly one field named `mp4File` is accepted; other fields are
/// skipped.
pub async fn extract_upload_file(
    mut multipart: Multipart,
    max_size: usize,
) -> Result<UploadedFile, AppError> {
    let mut upload: Option<UploadedFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        if upload.is_some() {
            return Err(AppError::BadRequest(format!(
                "Multiple '{}' fields are not allowed",
                UPLOAD_FIELD_NAME
            )));
        }

        let filename = field
            .file_name()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file data: {}", e)))?
        {
            if data.len() + chunk.len() > max_size {
                return Err(AppError::BadRequest(format!(
                    "File size exceeds maximum allowed size of {} MB",
                    max_size / 1024 / 1024
                )));
            }
            data.extend_from_slice(&chunk);
        }

        upload = Some(UploadedFile {
            filename,
            content_type,
            data,
        });
    }

    let upload = upload.ok_or_else(|| {
        AppError::BadRequest(format!("No file provided in field '{}'", UPLOAD_FIELD_NAME))
    })?;

    if upload.data.is_empty() {
        return Err(AppError::BadRequest("File is empty".to_string()));
    }

    Ok(upload)
}

/// Service for admitting uploads into the conversion pipeline
pub struct UploadService {
    state: Arc<AppState>,
}

impl UploadService {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self {
            state: Arc::clone(state),
        }
    }

    /// Read, store and schedule one upload.
    #[tracing::instrument(skip(self, multipart), fields(subject = %identity.subject))]
    pub async fn handle_upload(
        &self,
        identity: &Identity,
        multipart: Multipart,
    ) -> Result<UploadAccepted, AppError> {
        let file =
            extract_upload_file(multipart, self.state.config.max_upload_size_bytes).await?;
        self.admit(identity, file).await
    }

    /// Store the file and publish its task, undoing the store if the publish fails.
    pub async fn admit(
        &self,
        identity: &Identity,
        file: UploadedFile,
    ) -> Result<UploadAccepted, AppError> {
        let storage_config = &self.state.config.base.storage;
        let queue_config = &self.state.config.base.queue;
        let size_bytes = file.data.len() as i64;

        let blob_id = storage_timeout(
            storage_config.timeout,
            "put",
            self.state.storage.put(
                &storage_config.source_prefix,
                &file.filename,
                &file.content_type,
                file.data,
            ),
        )
        .await
        .map_err(|e| AppError::TransientStorage(e.to_string()))?;

        tracing::info!(
            blob_id = %blob_id,
            filename = %file.filename,
            size_bytes = size_bytes,
            "Upload stored"
        );

        let task = UploadTask::new(blob_id.clone(), file.filename, size_bytes, identity);
        let payload = match task.encode() {
            Ok(payload) => payload,
            Err(e) => {
                self.discard_blob(&blob_id).await;
                return Err(AppError::Internal(format!("Failed to encode task: {}", e)));
            }
        };

        let published = queue_timeout(
            queue_config.timeout,
            "publish",
            self.state
                .queue
                .publish(&queue_config.upload_topic, Bytes::from(payload)),
        )
        .await;

        if let Err(e) = published {
            tracing::warn!(
                error = %e,
                blob_id = %blob_id,
                topic = %queue_config.upload_topic,
                "Publishing upload task failed; removing stored blob"
            );
            self.discard_blob(&blob_id).await;
            return Err(AppError::TransientQueue(e.to_string()));
        }

        tracing::info!(
            blob_id = %blob_id,
            topic = %queue_config.upload_topic,
            "Upload task published"
        );

        Ok(UploadAccepted::new(&blob_id))
    }

    /// Compensating delete. A failure here is logged; the caller's error wins.
    async fn discard_blob(&self, blob_id: &BlobHandle) {
        let timeout = self.state.config.base.storage.timeout;
        if let Err(e) =
            storage_timeout(timeout, "delete", self.state.storage.delete(blob_id)).await
        {
            tracing::error!(
                error = %e,
                blob_id = %blob_id,
                "Failed to delete orphaned upload blob"
            );
        }
    }
}
