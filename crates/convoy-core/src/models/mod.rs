//! Message schema exchanged between the gateway and the worker.
//!
//! Both messages travel as flat camelCase JSON objects. There is no schema
//! version field; decoders reject payloads that break the message invariants.

pub mod blob;
pub mod conversion;
pub mod identity;
pub mod upload_task;

pub use blob::BlobHandle;
pub use conversion::{ConversionResult, ConversionStatus};
pub use identity::Identity;
pub use upload_task::UploadTask;

/// Errors raised while decoding a queue payload.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid message: {0}")]
    Invalid(String),
}
