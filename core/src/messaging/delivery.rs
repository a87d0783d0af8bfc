//! Outbound drain and inbound intake
//!
//! Delivery is at-least-once: the head is published while it stays in the
//! queue and is removed only after the transport acknowledges it. A drop
//! between the broker's acceptance and the removal republishes the message
//! next cycle.

use core::sync::atomic::{AtomicU32, Ordering};

use hal_abstractions::{InboundSink, MemoryProbe, MessagingTransport, QoS, TransportError};

use super::message::QueueMessage;
use super::queue::{Enqueued, SharedQueue};
use crate::error::{Error, ProtocolViolation};

/// What one drain pass achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DrainReport {
    pub delivered: usize,
    /// Messages the transport refused to frame; removed, never retried
    pub rejected: usize,
}

impl DrainReport {
    pub fn is_partial(&self) -> bool {
        self.rejected > 0
    }
}

/// Publish queued messages in FIFO order until the queue is empty
///
/// Each head gets up to `max_retry` attempts. When they are all spent the
/// pass stops with [`Error::PublishRetryExhausted`] and the head stays
/// queued in front of everything behind it.
pub async fn drain_outbound<T, const N: usize>(
    queue: &SharedQueue<N>,
    transport: &mut T,
    qos: QoS,
    max_retry: u8,
) -> Result<DrainReport, Error>
where
    T: MessagingTransport,
{
    let mut report = DrainReport::default();

    while let Some(head) = queue.peek() {
        if !transport.is_connected() {
            warn!("Drain stopped: transport disconnected");
            return Err(Error::TransportConnectFailure);
        }

        let mut attempt: u8 = 0;
        loop {
            let result = transport
                .publish(
                    head.message.topic(),
                    head.message.payload().as_bytes(),
                    qos,
                    false,
                )
                .await;
            match result {
                Ok(()) => {
                    queue.acknowledge(head.seq);
                    report.delivered += 1;
                    break;
                }
                Err(TransportError::Rejected) => {
                    let e = Error::ProtocolFailure(ProtocolViolation::RejectedByTransport);
                    warn!("Dropping seq {}: {}", head.seq, e);
                    queue.acknowledge(head.seq);
                    report.rejected += 1;
                    break;
                }
                Err(e) => {
                    attempt += 1;
                    warn!("Publish of seq {} failed ({:?}), attempt {}/{}", head.seq, e, attempt, max_retry);
                    if attempt >= max_retry {
                        error!("Drain aborted, seq {} stays at the head", head.seq);
                        return Err(Error::PublishRetryExhausted);
                    }
                }
            }
        }
    }

    Ok(report)
}

const NO_ID: u32 = u32::MAX;

/// Result of handing a received message to the inbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Intake {
    Queued(Enqueued),
    Duplicate,
    Rejected(ProtocolViolation),
}

/// Subscription receiver feeding the inbound queue
///
/// Consecutive deliveries with the same message id are collapsed.
pub struct Inbox<'a, P, const N: usize> {
    queue: &'a SharedQueue<N>,
    probe: P,
    last_id: AtomicU32,
}

impl<'a, P: MemoryProbe, const N: usize> Inbox<'a, P, N> {
    pub const fn new(queue: &'a SharedQueue<N>, probe: P) -> Self {
        Self {
            queue,
            probe,
            last_id: AtomicU32::new(NO_ID),
        }
    }

    /// Queue one inbound message
    ///
    /// Only the id is compared, never the content: repeated commands with
    /// fresh ids are all kept. Transports that cannot see broker packet ids
    /// number arrivals themselves, so redeliveries reach the queue again.
    pub fn receive(&self, topic: &str, payload: &[u8], message_id: u16) -> Intake {
        let previous = self.last_id.swap(message_id as u32, Ordering::AcqRel);
        if previous == message_id as u32 {
            debug!("Duplicate inbound id {}", message_id);
            return Intake::Duplicate;
        }

        match QueueMessage::from_bytes(topic, payload) {
            Ok(message) => Intake::Queued(self.queue.enqueue(message, &self.probe)),
            Err(v) => {
                warn!("Inbound id {} rejected: {}", message_id, Error::ProtocolFailure(v));
                Intake::Rejected(v)
            }
        }
    }
}

impl<P: MemoryProbe, const N: usize> InboundSink for Inbox<'_, P, N> {
    fn on_message(&self, topic: &str, payload: &[u8], message_id: u16) {
        let _ = self.receive(topic, payload, message_id);
    }
}
