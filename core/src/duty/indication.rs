//! Status indication duty

use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{IndicatorChannel, IndicatorOutput};

use super::Shared;
use crate::indicator::{pattern_for, Blinker, Levels};
use crate::supervisor::Heartbeat;

/// Red pulses shown for a failed drain
const ERROR_BLINKS: u8 = 2;

pub struct IndicationDuty<'a, O, D> {
    shared: Shared<'a>,
    output: O,
    delay: D,
    blinker: Blinker,
}

impl<'a, O, D> IndicationDuty<'a, O, D>
where
    O: IndicatorOutput,
    D: DelayNs,
{
    pub fn new(shared: Shared<'a>, output: O, delay: D) -> Self {
        let cfg = &shared.config.supervisor;
        Self {
            shared,
            output,
            delay,
            blinker: Blinker::new(cfg.slow_pulse_ticks, cfg.quick_pulse_ticks),
        }
    }

    pub async fn run(&mut self, heartbeat: Heartbeat<'_>) -> ! {
        info!("Indication duty starting");
        let tick = self.shared.config.supervisor.indication_tick_ms;
        self.show(Levels::default());
        loop {
            self.tick().await;
            heartbeat.beat();
            self.delay.delay_ms(tick).await;
        }
    }

    /// Show a pending error blink, then one pattern step
    pub async fn tick(&mut self) -> Levels {
        if self.shared.status.take_error_blink() {
            self.error_blink().await;
        }
        let status = self.shared.status;
        let levels = self
            .blinker
            .tick(pattern_for(status.connectivity(), status.messaging()));
        self.show(levels);
        levels
    }

    async fn error_blink(&mut self) {
        let pulse = self.shared.config.supervisor.error_blink_ms;
        self.output.set(IndicatorChannel::Green, false);
        for _ in 0..ERROR_BLINKS {
            self.output.set(IndicatorChannel::Red, true);
            self.delay.delay_ms(pulse).await;
            self.output.set(IndicatorChannel::Red, false);
            self.delay.delay_ms(pulse).await;
        }
    }

    fn show(&mut self, levels: Levels) {
        self.output.set(IndicatorChannel::Red, levels.red);
        self.output.set(IndicatorChannel::Green, levels.green);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::duty::tests::TallyDelay;
    use crate::duty::RelayQueue;
    use crate::identity::IdentityCell;
    use crate::status::{ConnectivityPhase, MessagingPhase, StatusBoard};
    use embassy_futures::block_on;

    /// Records every change of the red channel
    #[derive(Default)]
    struct Leds {
        red: bool,
        green: bool,
        red_edges: Vec<bool>,
    }

    impl IndicatorOutput for &mut Leds {
        fn set(&mut self, channel: IndicatorChannel, on: bool) {
            match channel {
                IndicatorChannel::Red => {
                    if self.red != on {
                        self.red_edges.push(on);
                    }
                    self.red = on;
                }
                IndicatorChannel::Green => self.green = on,
            }
        }
    }

    struct Rig {
        config: RelayConfig,
        status: StatusBoard,
        identity: IdentityCell,
        queue: RelayQueue,
        leds: Leds,
        delay: TallyDelay,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                config: RelayConfig::default(),
                status: StatusBoard::new(),
                identity: IdentityCell::new(),
                queue: RelayQueue::new(1, 0),
                leds: Leds::default(),
                delay: TallyDelay::default(),
            }
        }

        fn ticks(&mut self, n: usize) -> Vec<Levels> {
            let shared = Shared {
                config: &self.config,
                status: &self.status,
                identity: &self.identity,
                outbound: &self.queue,
                inbound: &self.queue,
            };
            let mut duty = IndicationDuty::new(shared, &mut self.leds, &mut self.delay);
            (0..n).map(|_| block_on(duty.tick())).collect()
        }
    }

    #[test]
    fn test_slow_red_while_link_down() {
        let mut rig = Rig::new();
        let levels = rig.ticks(200);
        assert!(levels[..100].iter().all(|l| l.red && !l.green));
        assert!(levels[100..].iter().all(|l| !l.red));
    }

    #[test]
    fn test_green_pulse_while_publishing() {
        let mut rig = Rig::new();
        rig.status.publish_sync(crate::time::TimeShift(0));
        rig.status.set_messaging(MessagingPhase::Publishing);
        let levels = rig.ticks(20);
        assert!(levels[..10].iter().all(|l| l.green && !l.red));
        assert!(levels[10..].iter().all(|l| !l.green));
    }

    #[test]
    fn test_dark_when_synced_and_idle() {
        let mut rig = Rig::new();
        rig.status.set_connectivity(ConnectivityPhase::TimeSynced);
        assert!(rig.ticks(30).iter().all(|l| *l == Levels::default()));
        assert!(!rig.leds.red && !rig.leds.green);
    }

    #[test]
    fn test_error_blink_pulses_red_twice() {
        let mut rig = Rig::new();
        rig.status.set_connectivity(ConnectivityPhase::TimeSynced);
        rig.status.request_error_blink();
        rig.ticks(1);
        assert_eq!(rig.leds.red_edges, [true, false, true, false]);
        assert_eq!(rig.delay.total_ms(), 40);
        // consumed
        rig.ticks(1);
        assert_eq!(rig.leds.red_edges.len(), 4);
    }
}
