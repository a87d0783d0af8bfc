//! Status indicator patterns
//!
//! Two channels, red and green. The pattern is a pure function of the
//! status board; the [`Blinker`] turns it into per-tick channel levels.

use hal_abstractions::IndicatorChannel;

use crate::status::{ConnectivityPhase, MessagingPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorPattern {
    Off,
    /// Internet not reachable
    SlowRed,
    /// Reachable but clock not synced
    FastRed,
    /// Draining the outbound queue
    FastGreen,
}

impl IndicatorPattern {
    pub const fn channel(self) -> Option<IndicatorChannel> {
        match self {
            Self::Off => None,
            Self::SlowRed | Self::FastRed => Some(IndicatorChannel::Red),
            Self::FastGreen => Some(IndicatorChannel::Green),
        }
    }
}

pub const fn pattern_for(connectivity: ConnectivityPhase, messaging: MessagingPhase) -> IndicatorPattern {
    if !connectivity.internet_ready() {
        IndicatorPattern::SlowRed
    } else if !connectivity.time_ready() {
        IndicatorPattern::FastRed
    } else if matches!(messaging, MessagingPhase::Publishing) {
        IndicatorPattern::FastGreen
    } else {
        IndicatorPattern::Off
    }
}

/// Channel levels for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Levels {
    pub red: bool,
    pub green: bool,
}

/// Square-wave generator
///
/// A pulse pattern with period `p` ticks is on for `p` ticks, then off for
/// `p` ticks. Switching patterns restarts at the beginning of an on phase.
#[derive(Debug)]
pub struct Blinker {
    slow: u16,
    quick: u16,
    pattern: IndicatorPattern,
    /// Position within the on/off cycle, below `2 * period`
    counter: u32,
}

impl Blinker {
    pub const fn new(slow_ticks: u16, quick_ticks: u16) -> Self {
        Self {
            slow: if slow_ticks == 0 { 1 } else { slow_ticks },
            quick: if quick_ticks == 0 { 1 } else { quick_ticks },
            pattern: IndicatorPattern::Off,
            counter: 0,
        }
    }

    const fn period(&self, pattern: IndicatorPattern) -> u32 {
        match pattern {
            IndicatorPattern::SlowRed => self.slow as u32,
            IndicatorPattern::FastRed | IndicatorPattern::FastGreen => self.quick as u32,
            IndicatorPattern::Off => 0,
        }
    }

    pub fn pattern(&self) -> IndicatorPattern {
        self.pattern
    }

    /// Advance one tick under `pattern`
    pub fn tick(&mut self, pattern: IndicatorPattern) -> Levels {
        let period = self.period(pattern);
        if pattern != self.pattern {
            trace!("Indicator pattern {:?} -> {:?}", self.pattern, pattern);
            self.pattern = pattern;
            self.counter = period;
        }

        let Some(channel) = pattern.channel() else {
            return Levels::default();
        };
        let on = self.counter / period == 1;
        self.counter = (self.counter + 1) % (period * 2);

        match channel {
            IndicatorChannel::Red => Levels { red: on, green: false },
            IndicatorChannel::Green => Levels { red: false, green: on },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_follows_the_lowest_unready_layer() {
        use ConnectivityPhase::*;
        let idle = MessagingPhase::Disconnected;
        assert_eq!(pattern_for(LinkDown, idle), IndicatorPattern::SlowRed);
        assert_eq!(pattern_for(LinkUp, idle), IndicatorPattern::SlowRed);
        assert_eq!(pattern_for(InternetUnreachable, idle), IndicatorPattern::SlowRed);
        assert_eq!(pattern_for(InternetReachable, idle), IndicatorPattern::FastRed);
        assert_eq!(pattern_for(TimeUnsynced, idle), IndicatorPattern::FastRed);
        assert_eq!(pattern_for(TimeSynced, idle), IndicatorPattern::Off);
        assert_eq!(
            pattern_for(TimeSynced, MessagingPhase::Publishing),
            IndicatorPattern::FastGreen
        );
        // Publishing never outranks a connectivity problem
        assert_eq!(
            pattern_for(TimeUnsynced, MessagingPhase::Publishing),
            IndicatorPattern::FastRed
        );
    }

    #[test]
    fn test_quick_pulse_square_wave() {
        let mut blinker = Blinker::new(100, 10);
        let levels: Vec<bool> = (0..40).map(|_| blinker.tick(IndicatorPattern::FastRed).red).collect();
        assert!(levels[..10].iter().all(|&on| on));
        assert!(levels[10..20].iter().all(|&on| !on));
        assert!(levels[20..30].iter().all(|&on| on));
        assert!(levels[30..].iter().all(|&on| !on));
    }

    #[test]
    fn test_slow_pulse_period() {
        let mut blinker = Blinker::new(100, 10);
        let on = (0..200)
            .filter(|_| blinker.tick(IndicatorPattern::SlowRed).red)
            .count();
        assert_eq!(on, 100);
    }

    #[test]
    fn test_pattern_change_restarts_on_phase() {
        let mut blinker = Blinker::new(100, 10);
        for _ in 0..15 {
            blinker.tick(IndicatorPattern::FastRed);
        }
        let levels = blinker.tick(IndicatorPattern::FastGreen);
        assert_eq!(levels, Levels { red: false, green: true });
        assert_eq!(blinker.pattern(), IndicatorPattern::FastGreen);
    }

    #[test]
    fn test_longest_period_wraps_back_on() {
        let mut blinker = Blinker::new(u16::MAX, 10);
        let period = u16::MAX as usize;
        let levels: Vec<bool> = (0..period * 2 + 1)
            .map(|_| blinker.tick(IndicatorPattern::SlowRed).red)
            .collect();
        assert!(levels[period - 1]);
        assert!(!levels[period]);
        assert!(!levels[period * 2 - 1]);
        assert!(levels[period * 2]);
    }

    #[test]
    fn test_off_is_dark() {
        let mut blinker = Blinker::new(100, 10);
        blinker.tick(IndicatorPattern::SlowRed);
        assert_eq!(blinker.tick(IndicatorPattern::Off), Levels::default());
    }
}
