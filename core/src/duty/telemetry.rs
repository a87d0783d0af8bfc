//! Built-in telemetry producer
//!
//! Stands in for real sensor polling: every interval it queues a
//! timestamped counter message and prints whatever the broker sent.

use core::fmt::Write;

use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{MemoryProbe, WallClock};

use super::Shared;
use crate::error::{Error, ProtocolViolation};
use crate::messaging::{Enqueued, QueueMessage, MAX_PAYLOAD_LEN};

pub struct TelemetryProducer<'a, C, P, D> {
    shared: Shared<'a>,
    clock: C,
    probe: P,
    delay: D,
    counter: u32,
}

impl<'a, C, P, D> TelemetryProducer<'a, C, P, D>
where
    C: WallClock,
    P: MemoryProbe,
    D: DelayNs,
{
    pub fn new(shared: Shared<'a>, clock: C, probe: P, delay: D) -> Self {
        Self {
            shared,
            clock,
            probe,
            delay,
            counter: 0,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub async fn run(&mut self) -> ! {
        let cfg = self.shared.config;
        self.delay.delay_ms(cfg.telemetry.startup_delay_ms).await;
        info!("Telemetry producer starting");
        loop {
            if let Err(e) = self.produce().await {
                debug!("Telemetry skipped: {}", e);
            }
            self.drain_inbound();
            self.delay.delay_ms(cfg.telemetry.interval_ms).await;
        }
    }

    /// Queue one message, once the clock is corrected and the identity known
    pub async fn produce(&mut self) -> Result<Enqueued, Error> {
        let shift = self.shared.status.time_shift().ok_or(Error::SyncTimeout)?;
        let id = self.shared.identity.get()?;
        let raw = self.clock.read()?;

        let stamp = shift.local_time(raw).timestamp();
        let mut payload: heapless::String<MAX_PAYLOAD_LEN> = heapless::String::new();
        write!(payload, "[{}] {} says: {}", stamp.as_str(), id.as_str(), self.counter)
            .map_err(|_| ProtocolViolation::PayloadTooLong)?;
        let message = QueueMessage::new(self.shared.config.messaging.publish_topic, &payload)?;

        self.wait_for_gate().await;
        let outcome = self.shared.outbound.enqueue(message, &self.probe);
        if outcome == Enqueued::EvictedOther {
            warn!("{}", Error::QueueCapacityEviction);
        }
        self.counter = self.counter.wrapping_add(1);
        Ok(outcome)
    }

    /// Hold off while the messaging duty has a session open, for at most
    /// `max_gate_checks` pauses
    async fn wait_for_gate(&mut self) {
        let cfg = self.shared.config;
        for _ in 0..cfg.telemetry.max_gate_checks {
            if !self.shared.status.messaging().is_busy() {
                return;
            }
            self.delay.delay_ms(cfg.messaging.publish_settle_ms).await;
        }
        debug!("Messaging still busy, enqueueing anyway");
    }

    /// Log and discard every received message; returns how many there were
    pub fn drain_inbound(&mut self) -> usize {
        let mut drained = 0;
        while let Some(message) = self.shared.inbound.dequeue() {
            info!("Server says: [Topic: {} | Payload: {}]", message.topic(), message.payload());
            drained += 1;
        }
        drained
    }
}
