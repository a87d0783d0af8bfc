//! Delivery queues and the publish/subscribe data path

pub mod delivery;
pub mod message;
pub mod queue;

pub use delivery::{drain_outbound, DrainReport, Inbox, Intake};
pub use message::{QueueMessage, MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
pub use queue::{Enqueued, MessageQueue, Sequenced, SharedQueue};

/// Compile-time bound on each queue
pub const QUEUE_DEPTH: usize = 50;
