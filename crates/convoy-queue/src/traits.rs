//! Task queue abstraction trait

use crate::QueueBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Queue operation errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Publish to '{topic}' failed: {message}")]
    PublishFailed { topic: String, message: String },

    #[error("Consume from '{topic}' failed: {message}")]
    ConsumeFailed { topic: String, message: String },

    #[error("Acknowledgement failed: {0}")]
    AckFailed(String),

    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Queue operation '{operation}' timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Queue closed")]
    Closed,
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Backend-specific settlement of one delivery.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Remove the message from the broker
    async fn ack(&self) -> QueueResult<()>;

    /// Make the message immediately available for redelivery
    async fn nack(&self) -> QueueResult<()>;
}

/// Settles exactly one delivery. Consumed by `ack` / `nack`.
pub struct AckHandle {
    inner: Box<dyn Acknowledger>,
}

impl AckHandle {
    pub fn new(inner: impl Acknowledger + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    pub async fn ack(self) -> QueueResult<()> {
        self.inner.ack().await
    }

    pub async fn nack(self) -> QueueResult<()> {
        self.inner.nack().await
    }
}

impl fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AckHandle")
    }
}

/// One message handed out by `TaskQueue::consume`.
///
/// Must be acked or nacked. A delivery that is neither is redelivered once the
/// broker gives up on it (immediately for the in-memory queue, after the
/// visibility timeout for SQS).
#[derive(Debug)]
pub struct Delivery {
    pub payload: Bytes,
    /// How many times this message has been handed out, starting at 1
    pub delivery_count: u32,
    pub handle: AckHandle,
}

impl Delivery {
    pub async fn ack(self) -> QueueResult<()> {
        self.handle.ack().await
    }

    pub async fn nack(self) -> QueueResult<()> {
        self.handle.nack().await
    }
}

/// Lazy, effectively infinite stream of deliveries
pub type DeliveryStream = Pin<Box<dyn Stream<Item = QueueResult<Delivery>> + Send>>;

/// Task queue capability
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publish a payload. Returns only after the broker acknowledged it.
    async fn publish(&self, topic: &str, payload: Bytes) -> QueueResult<()>;

    /// Pull deliveries from `topic`. Nothing is fetched until the stream is polled.
    async fn consume(&self, topic: &str) -> QueueResult<DeliveryStream>;

    /// Cheap connectivity probe
    async fn health_check(&self) -> QueueResult<()>;

    /// Get the queue backend type
    fn backend_type(&self) -> QueueBackend;
}

/// Bound a queue call by `limit`, mapping expiry to `QueueError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, operation: &'static str, fut: F) -> QueueResult<T>
where
    F: Future<Output = QueueResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(QueueError::Timeout {
            operation,
            elapsed: limit,
        }),
    }
}
