use serde::{Deserialize, Serialize};
use std::fmt;

use super::{BlobHandle, MessageError, UploadTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Succeeded,
    Failed,
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionStatus::Succeeded => write!(f, "succeeded"),
            ConversionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one conversion attempt, published to the results topic.
///
/// Terminal once built: fields are only readable. `error_detail` is present
/// exactly when the status is `Failed`, and `result_blob_id` is empty then.
/// Consumers deduplicate by `source_blob_id` when they need exactly-once output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    source_blob_id: BlobHandle,
    #[serde(default)]
    result_blob_id: BlobHandle,
    #[serde(default)]
    owner_identity: String,
    status: ConversionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_detail: Option<String>,
}

impl ConversionResult {
    pub fn succeeded(task: &UploadTask, result_blob_id: BlobHandle) -> Self {
        Self {
            source_blob_id: task.source_blob_id.clone(),
            result_blob_id,
            owner_identity: task.owner_identity.clone(),
            status: ConversionStatus::Succeeded,
            error_detail: None,
        }
    }

    pub fn failed(task: &UploadTask, error_detail: impl Into<String>) -> Self {
        Self {
            source_blob_id: task.source_blob_id.clone(),
            result_blob_id: BlobHandle::empty(),
            owner_identity: task.owner_identity.clone(),
            status: ConversionStatus::Failed,
            error_detail: Some(error_detail.into()),
        }
    }

    pub fn source_blob_id(&self) -> &BlobHandle {
        &self.source_blob_id
    }

    pub fn result_blob_id(&self) -> &BlobHandle {
        &self.result_blob_id
    }

    pub fn owner_identity(&self) -> &str {
        &self.owner_identity
    }

    pub fn status(&self) -> ConversionStatus {
        self.status
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status == ConversionStatus::Succeeded
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let result: ConversionResult = serde_json::from_slice(payload)?;
        match (result.status, &result.error_detail) {
            (ConversionStatus::Succeeded, Some(_)) => Err(MessageError::Invalid(
                "errorDetail present on a succeeded result".to_string(),
            )),
            (ConversionStatus::Succeeded, None) if result.result_blob_id.is_empty() => Err(
                MessageError::Invalid("succeeded result without resultBlobId".to_string()),
            ),
            (ConversionStatus::Failed, None) => Err(MessageError::Invalid(
                "failed result without errorDetail".to_string(),
            )),
            _ => Ok(result),
        }
    }
}
