use crate::error::ProtocolViolation;

pub const MAX_TOPIC_LEN: usize = 50;
pub const MAX_PAYLOAD_LEN: usize = 150;

pub type Topic = heapless::String<MAX_TOPIC_LEN>;
pub type Payload = heapless::String<MAX_PAYLOAD_LEN>;

/// A topic/payload pair held in a delivery queue
///
/// Over-length input is rejected at construction, never truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    topic: Topic,
    payload: Payload,
}

impl QueueMessage {
    pub fn new(topic: &str, payload: &str) -> Result<Self, ProtocolViolation> {
        let topic = Topic::try_from(topic).map_err(|_| ProtocolViolation::TopicTooLong)?;
        let payload = Payload::try_from(payload).map_err(|_| ProtocolViolation::PayloadTooLong)?;
        Ok(Self { topic, payload })
    }

    /// Build from raw payload bytes received off the wire
    pub fn from_bytes(topic: &str, payload: &[u8]) -> Result<Self, ProtocolViolation> {
        let payload = core::str::from_utf8(payload).map_err(|_| ProtocolViolation::InvalidEncoding)?;
        Self::new(topic, payload)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}
