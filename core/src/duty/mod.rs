//! Long-running duties
//!
//! Each duty is a struct owning its collaborators, with a `run` loop that
//! never returns and beats its heartbeat once per pass. Single passes are
//! exposed separately so they can be driven step by step.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use hal_abstractions::LinkEvent;

use crate::config::RelayConfig;
use crate::identity::IdentityCell;
use crate::messaging::{SharedQueue, QUEUE_DEPTH};
use crate::status::StatusBoard;

pub mod indication;
pub mod messaging;
pub mod network;
pub mod telemetry;

pub use indication::IndicationDuty;
pub use messaging::{CycleOutcome, MessagingDuty};
pub use network::{LinkState, NetworkDuty};
pub use telemetry::TelemetryProducer;

pub const LINK_EVENT_DEPTH: usize = 8;

/// Inbox for link driver events, read by the network duty
pub type LinkEvents = Channel<CriticalSectionRawMutex, LinkEvent, LINK_EVENT_DEPTH>;

pub type RelayQueue = SharedQueue<QUEUE_DEPTH>;

/// State shared by every duty
#[derive(Clone, Copy)]
pub struct Shared<'a> {
    pub config: &'a RelayConfig,
    pub status: &'a StatusBoard,
    pub identity: &'a IdentityCell,
    /// Messages waiting for the broker
    pub outbound: &'a RelayQueue,
    /// Messages received from the broker
    pub inbound: &'a RelayQueue,
}

#[cfg(test)]
pub(crate) mod tests {
    use embedded_hal_async::delay::DelayNs;

    /// Delay that returns immediately and adds up what it was asked for
    #[derive(Default)]
    pub(crate) struct TallyDelay {
        pub total_ns: u64,
    }

    impl DelayNs for TallyDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
        }
    }

    impl TallyDelay {
        pub fn total_ms(&self) -> u64 {
            self.total_ns / 1_000_000
        }
    }
}
