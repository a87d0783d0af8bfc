//! Clock sync and zone correction
//!
//! The clock source reports seconds that are really a wall-clock reading in
//! a source zone. After a sync the reading is reinterpreted in that zone,
//! converted to the target zone, and the difference is kept as a running
//! shift for every later read.

use embedded_hal_async::delay::DelayNs;
use hal_abstractions::WallClock;

use super::calendar::CivilDateTime;
use super::epoch::UnixSeconds;
use super::zone::ZoneInfo;
use super::zoned::ZonedDateTime;
use crate::config::SyncConfig;
use crate::error::Error;

/// Seconds to add to a raw clock reading to get target-zone wall time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeShift(pub i32);

impl TimeShift {
    /// Compute the shift from one raw reading
    pub fn compute(raw: u64, source: &ZoneInfo, target: &ZoneInfo) -> Self {
        let raw = raw as i64;
        let source_local = ZonedDateTime::resolve(CivilDateTime::from_unix_seconds(raw), source);
        let target_local = source_local.convert(target);
        Self((target_local.civil().to_unix_seconds() - raw) as i32)
    }

    /// Corrected local seconds for a raw reading
    pub fn apply(&self, raw: u64) -> i64 {
        raw as i64 + self.0 as i64
    }

    /// Corrected wall-clock fields for a raw reading
    pub fn local_time(&self, raw: u64) -> CivilDateTime {
        CivilDateTime::from_unix_seconds(self.apply(raw))
    }
}

/// Number of clock reads a sync wait performs before giving up
pub const fn sync_attempts(config: &SyncConfig) -> u32 {
    if config.poll_interval_ms == 0 {
        1
    } else {
        (config.timeout_ms / config.poll_interval_ms).saturating_add(1)
    }
}

/// Wait for the clock to report a plausible time
///
/// Polls every `poll_interval_ms` for at most [`sync_attempts`] reads.
/// Readings at or below `valid_after_unix` count as not synced yet.
pub async fn wait_for_valid_time<C, D>(
    clock: &C,
    delay: &mut D,
    config: &SyncConfig,
) -> Result<UnixSeconds, Error>
where
    C: WallClock,
    D: DelayNs,
{
    let attempts = sync_attempts(config);
    for attempt in 0..attempts {
        delay.delay_ms(config.poll_interval_ms).await;
        match clock.read() {
            Ok(secs) if secs > config.valid_after_unix => {
                debug!("Clock valid after {} polls", attempt + 1);
                return Ok(UnixSeconds(secs as i64));
            }
            Ok(_) | Err(_) => {}
        }
    }
    warn!("Clock not valid after {} polls", attempts);
    Err(Error::SyncTimeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::zonedb::{AMERICA_NEW_YORK, ASIA_COLOMBO, ASIA_SHANGHAI, ETC_UTC};
    use core::cell::Cell;
    use embassy_futures::block_on;
    use hal_abstractions::ClockError;

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    /// Reports `NotYetSynced` for the first `ready_after` reads
    struct ScriptedClock {
        reads: Cell<u32>,
        ready_after: u32,
        value: u64,
    }

    impl WallClock for ScriptedClock {
        async fn request_sync(&mut self, _server: &str) -> Result<(), ClockError> {
            Ok(())
        }

        fn read(&self) -> Result<u64, ClockError> {
            let n = self.reads.get();
            self.reads.set(n + 1);
            if n < self.ready_after {
                Err(ClockError::NotYetSynced)
            } else {
                Ok(self.value)
            }
        }
    }

    #[test]
    fn test_shift_shanghai_to_colombo() {
        let raw = CivilDateTime::new(2024, 1, 1, 12, 0, 0).to_unix_seconds() as u64;
        let shift = TimeShift::compute(raw, &ASIA_SHANGHAI, &ASIA_COLOMBO);
        assert_eq!(shift, TimeShift(-9000));
        assert_eq!(shift.local_time(raw), CivilDateTime::new(2024, 1, 1, 9, 30, 0));
    }

    #[test]
    fn test_shift_follows_target_dst() {
        let raw = CivilDateTime::new(2024, 7, 1, 12, 0, 0).to_unix_seconds() as u64;
        let shift = TimeShift::compute(raw, &ETC_UTC, &AMERICA_NEW_YORK);
        assert_eq!(shift, TimeShift(-4 * 3600));
    }

    #[test]
    fn test_attempt_count() {
        let config = SyncConfig::default();
        assert_eq!(sync_attempts(&config), 6);
    }

    #[test]
    fn test_attempt_count_saturates() {
        let config = SyncConfig {
            timeout_ms: u32::MAX,
            poll_interval_ms: 1,
            ..SyncConfig::default()
        };
        assert_eq!(sync_attempts(&config), u32::MAX);
    }

    #[test]
    fn test_wait_succeeds_once_clock_valid() {
        let clock = ScriptedClock {
            reads: Cell::new(0),
            ready_after: 3,
            value: 1_700_000_000,
        };
        let result = block_on(wait_for_valid_time(&clock, &mut NoDelay, &SyncConfig::default()));
        assert_eq!(result, Ok(UnixSeconds(1_700_000_000)));
        assert_eq!(clock.reads.get(), 4);
    }

    #[test]
    fn test_wait_is_bounded() {
        let clock = ScriptedClock {
            reads: Cell::new(0),
            ready_after: u32::MAX,
            value: 0,
        };
        let config = SyncConfig::default();
        let result = block_on(wait_for_valid_time(&clock, &mut NoDelay, &config));
        assert_eq!(result, Err(Error::SyncTimeout));
        assert_eq!(clock.reads.get(), sync_attempts(&config));
    }

    #[test]
    fn test_stale_reading_is_not_valid() {
        let clock = ScriptedClock {
            reads: Cell::new(0),
            ready_after: 0,
            value: 1000,
        };
        let result = block_on(wait_for_valid_time(&clock, &mut NoDelay, &SyncConfig::default()));
        assert_eq!(result, Err(Error::SyncTimeout));
    }
}
