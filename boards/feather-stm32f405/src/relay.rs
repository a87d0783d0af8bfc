#![deny(unsafe_code)]
#![deny(warnings)]
//! Process-wide relay state
//!
//! Built once in `init` and handed to every task as `&'static Relay`.

use relay_core::config::{ConfigError, RelayConfig, SyncZones};
use relay_core::duty::{LinkEvents, RelayQueue, Shared};
use relay_core::identity::IdentityCell;
use relay_core::messaging::QUEUE_DEPTH;
use relay_core::status::StatusBoard;
use relay_core::supervisor::{DutySlot, HeartbeatBoard};

use crate::memory::StackHeadroom;

/// Board overrides on top of the relay defaults
pub fn board_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    // SNTP readings are UTC
    config.sync.source_zone = "Etc/UTC";
    // A broker session over DNS, TCP and MQTT takes longer than a second
    config.supervisor.interval_ms = 10_000;
    config
}

pub struct Relay {
    pub config: RelayConfig,
    pub zones: SyncZones,
    pub status: StatusBoard,
    pub identity: IdentityCell,
    pub outbound: RelayQueue,
    pub inbound: RelayQueue,
    pub events: LinkEvents,
    pub heartbeats: HeartbeatBoard,
    pub slots: [DutySlot; 3],
}

impl Relay {
    pub fn new(config: RelayConfig) -> Result<Self, ConfigError> {
        config.validate(QUEUE_DEPTH)?;
        let zones = config.sync.zones()?;
        let queue = &config.queue;
        let (capacity, threshold) = (queue.capacity, queue.memory_threshold_bytes);
        Ok(Self {
            config,
            zones,
            status: StatusBoard::new(),
            identity: IdentityCell::new(),
            outbound: RelayQueue::new(capacity, threshold),
            inbound: RelayQueue::new(capacity, threshold),
            events: LinkEvents::new(),
            heartbeats: HeartbeatBoard::new(),
            slots: [DutySlot::new(), DutySlot::new(), DutySlot::new()],
        })
    }

    pub fn shared(&self) -> Shared<'_> {
        Shared {
            config: &self.config,
            status: &self.status,
            identity: &self.identity,
            outbound: &self.outbound,
            inbound: &self.inbound,
        }
    }

    pub fn probe(&self) -> StackHeadroom {
        StackHeadroom::new(self.config.queue.total_memory_bytes)
    }
}
