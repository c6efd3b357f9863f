use crate::traits::{
    AckHandle, Acknowledger, Delivery, DeliveryStream, QueueError, QueueResult, TaskQueue,
};
use crate::QueueBackend;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use aws_sdk_sqs::Client;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Messages are received only when the consumer pulls the next delivery, so a
/// received message's visibility timeout covers its processing alone.
const MESSAGES_PER_RECEIVE: i32 = 1;

/// Amazon SQS task queue. Topics are SQS queue names.
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_urls: Arc<RwLock<HashMap<String, String>>>,
    wait_time: Duration,
    visibility_timeout: Duration,
}

impl SqsQueue {
    /// Create a new SqsQueue instance
    ///
    /// # Arguments
    /// * `region` - AWS region
    /// * `endpoint_url` - Optional custom endpoint (e.g., "http://localhost:4566" for LocalStack)
    /// * `wait_time` - Long-poll duration per receive call (at most 20s)
    /// * `visibility_timeout` - How long a received message stays hidden from other consumers
    pub async fn new(
        region: String,
        endpoint_url: Option<String>,
        wait_time: Duration,
        visibility_timeout: Duration,
    ) -> QueueResult<Self> {
        let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let mut config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config);

        if let Some(ref endpoint) = endpoint_url {
            config_builder = config_builder.endpoint_url(endpoint);
        }

        let config = config_builder.load().await;

        Ok(Self::from_client(
            Client::new(&config),
            wait_time,
            visibility_timeout,
        ))
    }

    pub fn from_client(client: Client, wait_time: Duration, visibility_timeout: Duration) -> Self {
        Self {
            client,
            queue_urls: Arc::new(RwLock::new(HashMap::new())),
            wait_time,
            visibility_timeout,
        }
    }

    /// Resolve a queue name to its URL, once per topic.
    async fn queue_url(&self, topic: &str) -> QueueResult<String> {
        if let Some(url) = self.queue_urls.read().await.get(topic) {
            return Ok(url.clone());
        }

        let output = self
            .client
            .get_queue_url()
            .queue_name(topic)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_queue_does_not_exist())
                    .unwrap_or(false);
                if not_found {
                    QueueError::TopicNotFound(topic.to_string())
                } else {
                    QueueError::ConfigError(format!(
                        "Failed to resolve queue '{}': {}",
                        topic,
                        DisplayErrorContext(&e)
                    ))
                }
            })?;

        let url = output
            .queue_url()
            .map(String::from)
            .ok_or_else(|| QueueError::TopicNotFound(topic.to_string()))?;

        self.queue_urls
            .write()
            .await
            .insert(topic.to_string(), url.clone());

        tracing::debug!(topic = %topic, queue_url = %url, "Resolved SQS queue URL");
        Ok(url)
    }

    async fn receive_batch(&self, topic: &str, queue_url: &str) -> QueueResult<Vec<Message>> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(MESSAGES_PER_RECEIVE)
            .wait_time_seconds(self.wait_time.as_secs() as i32)
            .visibility_timeout(self.visibility_timeout.as_secs() as i32)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::ConsumeFailed {
                topic: topic.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(output.messages().to_vec())
    }

    fn to_delivery(&self, topic: &str, queue_url: &str, message: Message) -> QueueResult<Delivery> {
        let receipt_handle = message.receipt_handle().map(String::from).ok_or_else(|| {
            QueueError::ConsumeFailed {
                topic: topic.to_string(),
                message: "message without receipt handle".to_string(),
            }
        })?;

        let delivery_count = message
            .attributes()
            .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .and_then(|count| count.parse::<u32>().ok())
            .unwrap_or(1);

        let payload = Bytes::from(message.body().unwrap_or_default().to_string());

        Ok(Delivery {
            payload,
            delivery_count,
            handle: AckHandle::new(SqsAcker {
                client: self.client.clone(),
                queue_url: queue_url.to_string(),
                receipt_handle,
            }),
        })
    }
}

struct SqsAcker {
    client: Client,
    queue_url: String,
    receipt_handle: String,
}

#[async_trait]
impl Acknowledger for SqsAcker {
    async fn ack(&self) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&self.receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::AckFailed(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn nack(&self) -> QueueResult<()> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(&self.receipt_handle)
            .visibility_timeout(0)
            .send()
            .await
            .map_err(|e| QueueError::AckFailed(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

struct ConsumerState {
    queue: SqsQueue,
    topic: String,
    queue_url: String,
    buffered: VecDeque<Message>,
}

#[async_trait]
impl TaskQueue for SqsQueue {
    async fn publish(&self, topic: &str, payload: Bytes) -> QueueResult<()> {
        let queue_url = self.queue_url(topic).await?;
        let start = std::time::Instant::now();

        let body = String::from_utf8(payload.to_vec()).map_err(|_| QueueError::PublishFailed {
            topic: topic.to_string(),
            message: "SQS message bodies must be UTF-8".to_string(),
        })?;

        let output = self
            .client
            .send_message()
            .queue_url(&queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    topic = %topic,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "SQS publish failed"
                );
                QueueError::PublishFailed {
                    topic: topic.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                }
            })?;

        tracing::info!(
            topic = %topic,
            message_id = output.message_id().unwrap_or_default(),
            size_bytes = payload.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "SQS publish successful"
        );

        Ok(())
    }

    async fn consume(&self, topic: &str) -> QueueResult<DeliveryStream> {
        let queue_url = self.queue_url(topic).await?;

        let state = ConsumerState {
            queue: self.clone(),
            topic: topic.to_string(),
            queue_url,
            buffered: VecDeque::new(),
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(message) = state.buffered.pop_front() {
                    let delivery = state
                        .queue
                        .to_delivery(&state.topic, &state.queue_url, message);
                    return Some((delivery, state));
                }

                match state
                    .queue
                    .receive_batch(&state.topic, &state.queue_url)
                    .await
                {
                    Ok(messages) => state.buffered.extend(messages),
                    Err(e) => return Some((Err(e), state)),
                }
            }
        });

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> QueueResult<()> {
        self.client
            .list_queues()
            .max_results(1)
            .send()
            .await
            .map_err(|e| QueueError::ConfigError(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    fn backend_type(&self) -> QueueBackend {
        QueueBackend::Sqs
    }
}
