#[cfg(feature = "queue-sqs")]
use crate::SqsQueue;
use crate::{MemoryQueue, QueueBackend, QueueError, QueueResult, TaskQueue};
use convoy_core::QueueConfig;
use std::sync::Arc;

/// Create a queue backend based on configuration
pub async fn create_queue(config: &QueueConfig) -> QueueResult<Arc<dyn TaskQueue>> {
    match config.backend {
        #[cfg(feature = "queue-sqs")]
        QueueBackend::Sqs => {
            let region = config.sqs_region.clone().ok_or_else(|| {
                QueueError::ConfigError("SQS_REGION or AWS_REGION not configured".to_string())
            })?;

            let queue = SqsQueue::new(
                region,
                config.sqs_endpoint.clone(),
                config.wait_time,
                config.visibility_timeout,
            )
            .await?;
            Ok(Arc::new(queue))
        }

        #[cfg(not(feature = "queue-sqs"))]
        QueueBackend::Sqs => Err(QueueError::ConfigError(
            "SQS queue backend not available (queue-sqs feature not enabled)".to_string(),
        )),

        QueueBackend::Memory => {
            tracing::warn!("Using in-memory queue; only consumers in this process will see tasks");
            Ok(Arc::new(MemoryQueue::new()))
        }
    }
}
