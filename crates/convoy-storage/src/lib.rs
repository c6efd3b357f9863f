//! Convoy Storage Library
//!
//! Object store abstraction shared by the gateway (source uploads) and the
//! worker (source reads, result writes).
//!
//! # Blob handle format
//!
//! Every backend writes under `{prefix}/{uuid}-{sanitized filename}`, so two
//! uploads of the same file never collide and a handle is never overwritten.
//! Handles must not contain `..` or a leading `/`. Generation lives in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use convoy_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{with_timeout, Storage, StorageError, StorageResult};
