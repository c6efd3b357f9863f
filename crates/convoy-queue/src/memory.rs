//! In-process task queue.
//!
//! Per-topic FIFO with in-flight tracking. A delivery that is nacked or
//! dropped without being settled goes back to the tail of its topic with an
//! incremented delivery count, which mirrors broker redelivery closely enough
//! to test at-least-once consumers.

use crate::traits::{
    AckHandle, Acknowledger, Delivery, DeliveryStream, QueueError, QueueResult, TaskQueue,
};
use crate::QueueBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Clone)]
struct StoredMessage {
    id: u64,
    payload: Bytes,
    delivery_count: u32,
}

#[derive(Default)]
struct TopicState {
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<u64, StoredMessage>,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct Shared {
    topics: Mutex<HashMap<String, TopicState>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    failing_topics: Mutex<HashSet<String>>,
}

enum Poll {
    Ready(Delivery),
    Empty(Arc<Notify>),
}

impl Shared {
    fn topics(&self) -> QueueResult<MutexGuard<'_, HashMap<String, TopicState>>> {
        self.topics
            .lock()
            .map_err(|_| QueueError::ConfigError("memory queue lock poisoned".to_string()))
    }

    fn try_pop(self: &Arc<Self>, topic: &str) -> QueueResult<Poll> {
        let mut topics = self.topics()?;
        let state = topics.entry(topic.to_string()).or_default();

        let Some(mut message) = state.ready.pop_front() else {
            return Ok(Poll::Empty(state.notify.clone()));
        };

        message.delivery_count += 1;
        state.in_flight.insert(message.id, message.clone());

        let acker = MemoryAcker {
            shared: Arc::clone(self),
            topic: topic.to_string(),
            id: message.id,
            settled: AtomicBool::new(false),
        };

        Ok(Poll::Ready(Delivery {
            payload: message.payload,
            delivery_count: message.delivery_count,
            handle: AckHandle::new(acker),
        }))
    }

    fn release(&self, topic: &str, id: u64) {
        let Ok(mut topics) = self.topics() else {
            return;
        };
        if let Some(state) = topics.get_mut(topic) {
            if let Some(message) = state.in_flight.remove(&id) {
                state.ready.push_back(message);
                state.notify.notify_one();
            }
        }
    }
}

struct MemoryAcker {
    shared: Arc<Shared>,
    topic: String,
    id: u64,
    settled: AtomicBool,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> QueueResult<()> {
        if self.settled.swap(true, Ordering::SeqCst) {
            return Err(QueueError::AckFailed("delivery already settled".to_string()));
        }
        let mut topics = self.shared.topics()?;
        let removed = topics
            .get_mut(&self.topic)
            .and_then(|state| state.in_flight.remove(&self.id));
        if removed.is_none() {
            return Err(QueueError::AckFailed(format!(
                "message {} is not in flight on '{}'",
                self.id, self.topic
            )));
        }
        Ok(())
    }

    async fn nack(&self) -> QueueResult<()> {
        if self.settled.swap(true, Ordering::SeqCst) {
            return Err(QueueError::AckFailed("delivery already settled".to_string()));
        }
        self.shared.release(&self.topic, self.id);
        Ok(())
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if !self.settled.load(Ordering::SeqCst) {
            tracing::debug!(
                topic = %self.topic,
                message_id = self.id,
                "Unsettled delivery dropped; releasing for redelivery"
            );
            self.shared.release(&self.topic, self.id);
        }
    }
}

/// Task queue that lives inside the current process
#[derive(Clone, Default)]
pub struct MemoryQueue {
    shared: Arc<Shared>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting publishes and end every consume stream.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Ok(topics) = self.shared.topics() {
            for state in topics.values() {
                state.notify.notify_waiters();
                state.notify.notify_one();
            }
        }
    }

    /// Make publishes to `topic` fail with `PublishFailed`.
    pub fn fail_publishes_to(&self, topic: &str, fail: bool) {
        if let Ok(mut failing) = self.shared.failing_topics.lock() {
            if fail {
                failing.insert(topic.to_string());
            } else {
                failing.remove(topic);
            }
        }
    }

    /// Messages waiting to be delivered on `topic`, oldest first.
    pub fn ready_payloads(&self, topic: &str) -> Vec<Bytes> {
        match self.shared.topics() {
            Ok(topics) => topics
                .get(topic)
                .map(|state| state.ready.iter().map(|m| m.payload.clone()).collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    pub fn ready_count(&self, topic: &str) -> usize {
        self.ready_payloads(topic).len()
    }

    pub fn in_flight_count(&self, topic: &str) -> usize {
        match self.shared.topics() {
            Ok(topics) => topics.get(topic).map(|s| s.in_flight.len()).unwrap_or(0),
            Err(_) => 0,
        }
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn publish(&self, topic: &str, payload: Bytes) -> QueueResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        let failing = self
            .shared
            .failing_topics
            .lock()
            .map(|f| f.contains(topic))
            .unwrap_or(false);
        if failing {
            return Err(QueueError::PublishFailed {
                topic: topic.to_string(),
                message: "memory queue rejecting publishes".to_string(),
            });
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let size = payload.len();
        {
            let mut topics = self.shared.topics()?;
            let state = topics.entry(topic.to_string()).or_default();
            state.ready.push_back(StoredMessage {
                id,
                payload,
                delivery_count: 0,
            });
            state.notify.notify_one();
        }

        tracing::debug!(topic = %topic, message_id = id, size_bytes = size, "Memory queue publish");
        Ok(())
    }

    async fn consume(&self, topic: &str) -> QueueResult<DeliveryStream> {
        let shared = Arc::clone(&self.shared);
        let topic = topic.to_string();

        let stream = futures::stream::unfold((shared, topic), |(shared, topic)| async move {
            loop {
                if shared.closed.load(Ordering::SeqCst) {
                    return None;
                }
                let notify = match shared.try_pop(&topic) {
                    Ok(Poll::Ready(delivery)) => return Some((Ok(delivery), (shared, topic))),
                    Ok(Poll::Empty(notify)) => notify,
                    Err(e) => return Some((Err(e), (shared, topic))),
                };
                notify.notified().await;
            }
        });

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> QueueResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    fn backend_type(&self) -> QueueBackend {
        QueueBackend::Memory
    }
}
