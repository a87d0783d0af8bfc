//! Network maintenance duty
//!
//! Walks the connectivity chain link -> internet -> clock, working only on
//! the lowest layer that is not ready yet. A link loss drops the board back
//! to `LinkDown`, which un-readies every layer above it in one store.

use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{LinkDriver, LinkEvent, Reachability, WallClock};

use super::{LinkEvents, Shared};
use crate::config::SyncZones;
use crate::error::Error;
use crate::status::ConnectivityPhase;
use crate::supervisor::Heartbeat;
use crate::time::{wait_for_valid_time, CivilDateTime, Epoch, TimeShift};

/// Station association as seen by the duty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Down,
    /// Association requested, waiting for an address
    Associating,
    Up,
}

pub struct NetworkDuty<'a, L, R, C, D> {
    shared: Shared<'a>,
    zones: SyncZones,
    events: &'a LinkEvents,
    link: L,
    reach: R,
    clock: C,
    delay: D,
    link_state: LinkState,
    waited: u16,
}

impl<'a, L, R, C, D> NetworkDuty<'a, L, R, C, D>
where
    L: LinkDriver,
    R: Reachability,
    C: WallClock,
    D: DelayNs,
{
    pub fn new(
        shared: Shared<'a>,
        zones: SyncZones,
        events: &'a LinkEvents,
        link: L,
        reach: R,
        clock: C,
        delay: D,
    ) -> Self {
        Self {
            shared,
            zones,
            events,
            link,
            reach,
            clock,
            delay,
            link_state: LinkState::Down,
            waited: 0,
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub async fn run(&mut self, heartbeat: Heartbeat<'_>) -> ! {
        info!("Network duty starting");
        let pause = self.shared.config.supervisor.network_pass_ms;
        loop {
            self.pass().await;
            heartbeat.beat();
            self.delay.delay_ms(pause).await;
        }
    }

    /// One maintenance pass; returns the resulting phase
    pub async fn pass(&mut self) -> ConnectivityPhase {
        let status = self.shared.status;
        self.drain_events();
        if self.link.has_address() && self.link_state != LinkState::Up {
            debug!("Link holds an address");
            self.link_state = LinkState::Up;
        }

        match self.link_state {
            LinkState::Down => {
                status.set_connectivity(ConnectivityPhase::LinkDown);
                self.associate().await;
                return status.connectivity();
            }
            LinkState::Associating => {
                status.set_connectivity(ConnectivityPhase::LinkDown);
                self.waited = self.waited.saturating_add(1);
                if self.waited >= self.shared.config.link.associate_timeout_passes {
                    warn!("Association timed out after {} passes", self.waited);
                    self.link_state = LinkState::Down;
                }
                return status.connectivity();
            }
            LinkState::Up => {}
        }

        if status.connectivity() == ConnectivityPhase::LinkDown {
            status.set_connectivity(ConnectivityPhase::LinkUp);
        }
        if !status.connectivity().internet_ready() && self.probe().await.is_err() {
            return status.connectivity();
        }
        if !status.connectivity().time_ready() {
            let _ = self.sync().await;
        }
        status.connectivity()
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_receive() {
            debug!("Link event {:?}", event);
            match event {
                LinkEvent::GotLocalAddress(mac) => {
                    let prefix = self.shared.config.identity.prefix;
                    if let Err(e) = self.shared.identity.resolve(prefix, &mac) {
                        warn!("Identity: {}", e);
                    }
                    self.link_state = LinkState::Up;
                }
                LinkEvent::ProbeReceived => self.link_state = LinkState::Up,
                LinkEvent::LinkDown => {
                    if self.link_state == LinkState::Up {
                        warn!("Link lost");
                    }
                    self.link_state = LinkState::Down;
                }
                LinkEvent::LinkUp | LinkEvent::AuthChanged => {}
            }
        }
    }

    async fn associate(&mut self) {
        let link = &self.shared.config.link;
        match self.link.connect(link.ssid, link.password).await {
            Ok(()) => {
                info!("Associating with {}", link.ssid);
                self.link_state = LinkState::Associating;
                self.waited = 0;
            }
            Err(e) => warn!("{}: {}", Error::from(e), e),
        }
    }

    async fn probe(&mut self) -> Result<(), Error> {
        let status = self.shared.status;
        let target = &self.shared.config.reachability;
        let result = match self.reach.resolve_host(target.probe_host).await {
            Ok(address) => self.reach.tcp_probe(address, target.probe_port).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                status.set_connectivity(ConnectivityPhase::InternetReachable);
                Ok(())
            }
            Err(e) => {
                warn!("Probe of {} failed: {}", target.probe_host, e);
                status.set_connectivity(ConnectivityPhase::InternetUnreachable);
                Err(e.into())
            }
        }
    }

    async fn sync(&mut self) -> Result<TimeShift, Error> {
        let config = &self.shared.config.sync;
        let status = self.shared.status;

        let result = match self.clock.request_sync(config.server).await {
            Ok(()) => wait_for_valid_time(&self.clock, &mut self.delay, config).await,
            Err(e) => Err(e.into()),
        };
        // Readings outside the epoch's year window are not trusted
        let result = result.and_then(|raw| {
            let year = CivilDateTime::from_unix_seconds(raw.0).year;
            let epoch = Epoch::current();
            if epoch.is_year_valid(year) {
                Ok(raw)
            } else {
                warn!(
                    "Clock reading in {} outside [{}, {})",
                    year,
                    epoch.valid_year_lower(),
                    epoch.valid_year_upper()
                );
                Err(Error::SyncTimeout)
            }
        });
        match result {
            Ok(raw) => {
                let shift = TimeShift::compute(raw.0 as u64, self.zones.source, self.zones.target);
                info!("Clock synced at {}, shift {} s", raw.0, shift.0);
                status.publish_sync(shift);
                Ok(shift)
            }
            Err(e) => {
                warn!("Sync with {} failed: {}", config.server, e);
                status.set_connectivity(ConnectivityPhase::TimeUnsynced);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::duty::tests::TallyDelay;
    use crate::duty::RelayQueue;
    use crate::identity::IdentityCell;
    use crate::status::StatusBoard;
    use embassy_futures::block_on;
    use hal_abstractions::{ClockError, LinkError, ReachabilityError};

    #[derive(Default)]
    struct FakeLink {
        connects: u32,
        address: bool,
        refuse: bool,
    }

    impl LinkDriver for &mut FakeLink {
        async fn connect(&mut self, _ssid: &str, _password: &str) -> Result<(), LinkError> {
            self.connects += 1;
            if self.refuse {
                Err(LinkError::Rejected)
            } else {
                Ok(())
            }
        }

        fn has_address(&self) -> bool {
            self.address
        }
    }

    struct FakeReach {
        resolve: Result<u32, ReachabilityError>,
        probes: u32,
    }

    impl Reachability for &mut FakeReach {
        type Address = u32;

        async fn resolve_host(&mut self, _host: &str) -> Result<u32, ReachabilityError> {
            self.resolve
        }

        async fn tcp_probe(&mut self, _address: u32, port: u16) -> Result<(), ReachabilityError> {
            assert_eq!(port, 80);
            self.probes += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeClock {
        value: Option<u64>,
        requests: u32,
    }

    impl WallClock for &mut FakeClock {
        async fn request_sync(&mut self, server: &str) -> Result<(), ClockError> {
            assert_eq!(server, "time.nist.gov");
            self.requests += 1;
            Ok(())
        }

        fn read(&self) -> Result<u64, ClockError> {
            self.value.ok_or(ClockError::NotYetSynced)
        }
    }

    struct Rig {
        config: RelayConfig,
        status: StatusBoard,
        identity: IdentityCell,
        outbound: RelayQueue,
        inbound: RelayQueue,
        events: LinkEvents,
        link: FakeLink,
        reach: FakeReach,
        clock: FakeClock,
        delay: TallyDelay,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                config: RelayConfig::default(),
                status: StatusBoard::new(),
                identity: IdentityCell::new(),
                outbound: RelayQueue::new(50, 0),
                inbound: RelayQueue::new(50, 0),
                events: LinkEvents::new(),
                link: FakeLink::default(),
                reach: FakeReach { resolve: Ok(1), probes: 0 },
                clock: FakeClock::default(),
                delay: TallyDelay::default(),
            }
        }

        /// Run `passes` passes and return the final phase and link state
        fn passes(&mut self, passes: usize) -> (ConnectivityPhase, LinkState) {
            let shared = Shared {
                config: &self.config,
                status: &self.status,
                identity: &self.identity,
                outbound: &self.outbound,
                inbound: &self.inbound,
            };
            let zones = self.config.sync.zones().unwrap();
            let mut duty = NetworkDuty::new(
                shared,
                zones,
                &self.events,
                &mut self.link,
                &mut self.reach,
                &mut self.clock,
                &mut self.delay,
            );
            let mut phase = ConnectivityPhase::LinkDown;
            for _ in 0..passes {
                phase = block_on(duty.pass());
            }
            (phase, duty.link_state())
        }
    }

    const MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x12, 0x34, 0xab];

    fn noon_2024() -> u64 {
        CivilDateTime::new(2024, 1, 1, 12, 0, 0).to_unix_seconds() as u64
    }

    #[test]
    fn test_down_link_requests_association() {
        let mut rig = Rig::new();
        let (phase, state) = rig.passes(1);
        assert_eq!(phase, ConnectivityPhase::LinkDown);
        assert_eq!(state, LinkState::Associating);
        assert_eq!(rig.link.connects, 1);
    }

    #[test]
    fn test_association_is_reissued_after_timeout() {
        let mut rig = Rig::new();
        rig.config.link.associate_timeout_passes = 3;
        // one pass to associate, three to time out, one to reissue
        rig.passes(5);
        assert_eq!(rig.link.connects, 2);
    }

    #[test]
    fn test_refused_association_retries_every_pass() {
        let mut rig = Rig::new();
        rig.link.refuse = true;
        let (_, state) = rig.passes(3);
        assert_eq!(state, LinkState::Down);
        assert_eq!(rig.link.connects, 3);
    }

    #[test]
    fn test_address_event_walks_up_to_synced() {
        let mut rig = Rig::new();
        rig.clock.value = Some(noon_2024());
        rig.events.try_send(LinkEvent::LinkUp).unwrap();
        rig.events.try_send(LinkEvent::GotLocalAddress(MAC)).unwrap();

        let (phase, state) = rig.passes(1);
        assert_eq!(state, LinkState::Up);
        assert_eq!(phase, ConnectivityPhase::TimeSynced);
        assert_eq!(rig.identity.get().unwrap().as_str(), "lihini_02:00:00:12:34:ab");
        // Shanghai reading corrected to Colombo
        assert_eq!(rig.status.time_shift(), Some(TimeShift(-9000)));
        assert_eq!(rig.link.connects, 0);
    }

    #[test]
    fn test_synced_chain_is_not_revalidated() {
        let mut rig = Rig::new();
        rig.link.address = true;
        rig.clock.value = Some(noon_2024());
        rig.passes(4);
        assert_eq!(rig.reach.probes, 1);
        assert_eq!(rig.clock.requests, 1);
    }

    #[test]
    fn test_probe_failure_blocks_sync() {
        let mut rig = Rig::new();
        rig.link.address = true;
        rig.reach.resolve = Err(ReachabilityError::DnsFailed);
        let (phase, _) = rig.passes(2);
        assert_eq!(phase, ConnectivityPhase::InternetUnreachable);
        assert_eq!(rig.clock.requests, 0);
    }

    #[test]
    fn test_sync_timeout_is_bounded_and_retried() {
        let mut rig = Rig::new();
        rig.link.address = true;
        let (phase, _) = rig.passes(1);
        assert_eq!(phase, ConnectivityPhase::TimeUnsynced);
        assert_eq!(rig.status.time_shift(), None);
        // 6 polls of 100 ms
        assert_eq!(rig.delay.total_ms(), 600);

        rig.clock.value = Some(noon_2024());
        let (phase, _) = rig.passes(1);
        assert_eq!(phase, ConnectivityPhase::TimeSynced);
        assert_eq!(rig.clock.requests, 2);
    }

    #[test]
    fn test_reading_outside_epoch_window_is_not_synced() {
        let mut rig = Rig::new();
        rig.link.address = true;
        rig.clock.value = Some(CivilDateTime::new(2120, 1, 1, 0, 0, 0).to_unix_seconds() as u64);
        let (phase, _) = rig.passes(1);
        assert_eq!(phase, ConnectivityPhase::TimeUnsynced);
        assert_eq!(rig.status.time_shift(), None);

        rig.clock.value = Some(noon_2024());
        assert_eq!(rig.passes(1).0, ConnectivityPhase::TimeSynced);
    }

    #[test]
    fn test_link_loss_resets_every_layer() {
        let mut rig = Rig::new();
        rig.clock.value = Some(noon_2024());
        rig.events.try_send(LinkEvent::GotLocalAddress(MAC)).unwrap();
        assert_eq!(rig.passes(1).0, ConnectivityPhase::TimeSynced);

        rig.events.try_send(LinkEvent::LinkDown).unwrap();
        let (phase, state) = rig.passes(1);
        assert_eq!(phase, ConnectivityPhase::LinkDown);
        assert_eq!(state, LinkState::Associating);
        assert_eq!(rig.status.time_shift(), None);

        rig.events.try_send(LinkEvent::ProbeReceived).unwrap();
        assert_eq!(rig.passes(1).0, ConnectivityPhase::TimeSynced);
        assert_eq!(rig.reach.probes, 2);
    }
}
