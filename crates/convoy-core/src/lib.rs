//! Convoy Core Library
//!
//! This crate provides the message schema, error types, configuration and
//! telemetry setup shared by the gateway and the conversion worker.

pub mod backend_types;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod task_error;
pub mod telemetry;

// Re-export commonly used types
pub use backend_types::{QueueBackend, StorageBackend};
pub use config::{
    BaseConfig, GatewayConfig, LogFormat, QueueConfig, StorageConfig, WorkerConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    BlobHandle, ConversionResult, ConversionStatus, Identity, MessageError, UploadTask,
};
pub use task_error::{TaskError, TaskResultExt};
