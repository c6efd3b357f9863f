//! Convoy Queue Library
//!
//! At-least-once task queue abstraction. Publishing returns once the broker
//! accepted the message; consuming yields deliveries that must be explicitly
//! acknowledged, otherwise the broker hands them out again.

pub mod factory;
pub mod memory;
#[cfg(feature = "queue-sqs")]
pub mod sqs;
pub mod traits;

// Re-export commonly used types
pub use convoy_core::QueueBackend;
pub use factory::create_queue;
pub use memory::MemoryQueue;
#[cfg(feature = "queue-sqs")]
pub use sqs::SqsQueue;
pub use traits::{
    with_timeout, AckHandle, Acknowledger, Delivery, DeliveryStream, QueueError, QueueResult,
    TaskQueue,
};
