//! Conversion worker: upload topic in, conversion results out.
//!
//! Each delivery is acked only after its ConversionResult has been published.
//! Transient failures nack the delivery so the broker hands it out again;
//! failures that would repeat on every attempt are published as `Failed`
//! results instead.

use crate::converter::{ConversionError, Converter};
use crate::state::{RunSummary, TaskState};
use anyhow::Context;
use bytes::Bytes;
use convoy_core::{
    BlobHandle, ConversionResult, TaskError, TaskResultExt, UploadTask, WorkerConfig,
};
use convoy_queue::{with_timeout as queue_timeout, Delivery, TaskQueue};
use convoy_storage::{with_timeout as storage_timeout, Storage, StorageError};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Pause after the delivery stream reports an error before polling it again
const CONSUME_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct ConversionWorker {
    config: WorkerConfig,
    storage: Arc<dyn Storage>,
    queue: Arc<dyn TaskQueue>,
    converter: Arc<dyn Converter>,
}

impl ConversionWorker {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn Storage>,
        queue: Arc<dyn TaskQueue>,
        converter: Arc<dyn Converter>,
    ) -> Self {
        Self {
            config,
            storage,
            queue,
            converter,
        }
    }

    /// Consume the upload topic until `shutdown` fires or the stream ends.
    ///
    /// At most `concurrency` deliveries are in flight; a permit is taken before
    /// the next delivery is pulled. On shutdown no new deliveries are pulled and
    /// the in-flight ones are allowed to finish.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> anyhow::Result<RunSummary> {
        let topic = self.config.base.queue.upload_topic.clone();
        let mut deliveries = self
            .queue
            .consume(&topic)
            .await
            .with_context(|| format!("Failed to consume from '{}'", topic))?;

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut in_flight: JoinSet<TaskState> = JoinSet::new();
        let mut summary = RunSummary::default();

        tracing::info!(
            topic = %topic,
            concurrency = self.config.concurrency,
            "Conversion worker started"
        );

        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => permit?,
            };

            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => {
                    let worker = Arc::clone(&self);
                    in_flight.spawn(async move {
                        let _permit = permit;
                        worker.handle_delivery(delivery).await
                    });
                }
                Some(Err(e)) => {
                    drop(permit);
                    tracing::error!(error = %e, topic = %topic, "Failed to receive delivery");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(CONSUME_RETRY_DELAY) => {}
                    }
                }
                None => {
                    tracing::info!(topic = %topic, "Delivery stream ended");
                    break;
                }
            }

            while let Some(joined) = in_flight.try_join_next() {
                record_joined(&mut summary, joined);
            }
        }

        tracing::info!(
            in_flight = in_flight.len(),
            "Conversion worker stopping; draining in-flight tasks"
        );
        while let Some(joined) = in_flight.join_next().await {
            record_joined(&mut summary, joined);
        }

        tracing::info!(
            published = summary.published,
            failed = summary.failed,
            released = summary.released,
            discarded = summary.discarded,
            "Conversion worker stopped"
        );
        Ok(summary)
    }

    /// Process one delivery and settle it. Returns the state it ended in.
    #[tracing::instrument(skip(self, delivery), fields(delivery_count = delivery.delivery_count))]
    pub async fn handle_delivery(&self, delivery: Delivery) -> TaskState {
        let task = match UploadTask::decode(&delivery.payload) {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    size_bytes = delivery.payload.len(),
                    "Discarding undecodable upload task"
                );
                settle(delivery, true).await;
                return TaskState::Discarded;
            }
        };
        transition(&task, TaskState::Received, TaskState::Fetching);

        let result = match self.process(&task).await {
            Ok(result) => result,
            Err(e) if !e.error.is_recoverable() => {
                tracing::warn!(
                    error = %e.error,
                    stage = %e.stage,
                    source = %task.source_blob_id,
                    "Task cannot be converted; publishing failed result"
                );
                transition(&task, e.stage, TaskState::Failed);
                ConversionResult::failed(&task, e.error.to_string())
            }
            Err(e) => {
                tracing::warn!(
                    error = %e.error,
                    stage = %e.stage,
                    source = %task.source_blob_id,
                    "Transient failure; releasing delivery for redelivery"
                );
                transition(&task, e.stage, TaskState::Released);
                settle(delivery, false).await;
                return TaskState::Released;
            }
        };

        let publishing_from = if result.is_success() {
            TaskState::Converting
        } else {
            TaskState::Failed
        };
        transition(&task, publishing_from, TaskState::Publishing);

        if let Err(e) = self.publish(&result).await {
            tracing::warn!(
                error = %e,
                source = %task.source_blob_id,
                "Publishing conversion result failed; releasing delivery"
            );
            if !result.result_blob_id().is_empty() {
                self.discard_result(result.result_blob_id()).await;
            }
            settle(delivery, false).await;
            return TaskState::Released;
        }

        settle(delivery, true).await;

        let final_state = if result.is_success() {
            TaskState::Published
        } else {
            TaskState::Failed
        };
        transition(&task, TaskState::Publishing, final_state);
        tracing::info!(
            source = %task.source_blob_id,
            result = %result.result_blob_id(),
            status = %result.status(),
            "Upload task processed"
        );
        final_state
    }

    /// Fetch, convert and store one task, returning its `Succeeded` result.
    ///
    /// An unreadable source blob (missing or an invalid handle) and any
    /// conversion error are unrecoverable; store failures and timeouts are
    /// recoverable. The error carries the state the task failed in.
    pub async fn process(&self, task: &UploadTask) -> Result<ConversionResult, StageError> {
        let storage_config = &self.config.base.storage;

        let source = storage_timeout(
            storage_config.timeout,
            "get",
            self.storage.get(&task.source_blob_id),
        )
        .await
        .map_err(|e| match e {
            StorageError::NotFound(_) => TaskError::unrecoverable(anyhow::anyhow!(
                "source blob not found: {}",
                task.source_blob_id
            )),
            StorageError::InvalidKey(_) => TaskError::unrecoverable(anyhow::anyhow!(
                "source blob handle is invalid: {}",
                task.source_blob_id
            )),
            other => TaskError::recoverable(
                anyhow::Error::new(other).context("Failed to fetch source blob"),
            ),
        })
        .map_err(StageError::at(TaskState::Fetching))?;
        transition(task, TaskState::Fetching, TaskState::Converting);

        let artifact = tokio::time::timeout(
            self.config.conversion_timeout,
            self.converter.convert(task, source),
        )
        .await
        .unwrap_or(Err(ConversionError::Timeout(self.config.conversion_timeout)))
        .unrecoverable()
        .map_err(StageError::at(TaskState::Converting))?;

        let result_blob_id = storage_timeout(
            storage_config.timeout,
            "put",
            self.storage.put(
                &storage_config.result_prefix,
                &artifact.filename,
                &artifact.content_type,
                artifact.data,
            ),
        )
        .await
        .map_err(|e| anyhow::Error::new(e).context("Failed to store conversion result"))
        .recoverable()
        .map_err(StageError::at(TaskState::Converting))?;

        Ok(ConversionResult::succeeded(task, result_blob_id))
    }

    async fn publish(&self, result: &ConversionResult) -> anyhow::Result<()> {
        let queue_config = &self.config.base.queue;
        let payload = result.encode().context("Failed to encode conversion result")?;

        queue_timeout(
            queue_config.timeout,
            "publish",
            self.queue
                .publish(&queue_config.result_topic, Bytes::from(payload)),
        )
        .await?;
        Ok(())
    }

    /// Best-effort removal of a result blob whose result was never published.
    async fn discard_result(&self, handle: &BlobHandle) {
        let timeout = self.config.base.storage.timeout;
        if let Err(e) = storage_timeout(timeout, "delete", self.storage.delete(handle)).await {
            tracing::error!(error = %e, result = %handle, "Failed to delete unpublished result blob");
        }
    }
}

/// A `process` failure and the state the task was in when it happened
#[derive(Debug)]
pub struct StageError {
    pub stage: TaskState,
    pub error: TaskError,
}

impl StageError {
    fn at(stage: TaskState) -> impl FnOnce(TaskError) -> StageError {
        move |error| StageError { stage, error }
    }
}

fn transition(task: &UploadTask, from: TaskState, to: TaskState) {
    tracing::debug!(source = %task.source_blob_id, from = %from, to = %to, "Task state transition");
}

async fn settle(delivery: Delivery, ack: bool) {
    let outcome = if ack {
        delivery.ack().await
    } else {
        delivery.nack().await
    };
    if let Err(e) = outcome {
        tracing::error!(error = %e, ack = ack, "Failed to settle delivery");
    }
}

fn record_joined(summary: &mut RunSummary, joined: Result<TaskState, tokio::task::JoinError>) {
    match joined {
        Ok(state) => summary.record(state),
        Err(e) => tracing::error!(error = %e, "Delivery task panicked"),
    }
}
