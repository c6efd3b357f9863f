use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BlobHandle, Identity, MessageError};

/// Conversion request published by the gateway once the source blob is stored.
///
/// Delivered at least once: the worker must tolerate seeing the same task twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    pub source_blob_id: BlobHandle,
    pub original_filename: String,
    pub size_bytes: i64,
    #[serde(default)]
    pub owner_identity: String,
    pub created_at: DateTime<Utc>,
}

impl UploadTask {
    pub fn new(
        source_blob_id: BlobHandle,
        original_filename: impl Into<String>,
        size_bytes: i64,
        owner: &Identity,
    ) -> Self {
        Self {
            source_blob_id,
            original_filename: original_filename.into(),
            size_bytes,
            owner_identity: owner.subject.clone(),
            created_at: Utc::now(),
        }
    }

    /// Serialize to the JSON wire format.
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse and validate a payload received from the queue.
    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let task: UploadTask = serde_json::from_slice(payload)?;
        if task.source_blob_id.is_empty() {
            return Err(MessageError::Invalid("sourceBlobId is empty".to_string()));
        }
        if task.size_bytes <= 0 {
            return Err(MessageError::Invalid(format!(
                "sizeBytes must be positive, got {}",
                task.size_bytes
            )));
        }
        Ok(task)
    }
}
