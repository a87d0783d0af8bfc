//! Epoch-relative seconds
//!
//! [`EpochSeconds`] count from 00:00:00 UTC on January 1 of a configurable
//! epoch year. [`UnixSeconds`] always count from 1970. Converting between
//! them is a fixed offset in days, cached in [`Epoch`].
//!
//! The process-wide epoch is held behind a critical section so readers never
//! observe a year paired with another year's offset. Changing it invalidates
//! every `EpochSeconds` computed earlier.

use core::cell::Cell;

use critical_section::Mutex;

use super::calendar::{civil_from_unix_days, unix_days_from_civil, CivilDate, SECONDS_PER_DAY};

/// Epoch year used until [`set_current_epoch_year`] is called
pub const DEFAULT_EPOCH_YEAR: i16 = 2050;

/// Half-width, in years, of the range around the epoch year where
/// 32-bit epoch seconds stay representable
pub const VALID_YEAR_SPAN: i16 = 50;

/// Seconds since 1970-01-01T00:00:00 UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnixSeconds(pub i64);

/// Seconds since 00:00:00 UTC on January 1 of the epoch year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EpochSeconds(pub i64);

/// An epoch year with its precomputed day offset from 1970
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Epoch {
    year: i16,
    days_from_unix: i32,
}

impl Epoch {
    pub const fn new(year: i16) -> Self {
        Self {
            year,
            days_from_unix: unix_days_from_civil(year, 1, 1),
        }
    }

    /// The process-wide epoch
    pub fn current() -> Self {
        critical_section::with(|cs| CURRENT_EPOCH.borrow(cs).get())
    }

    pub const fn year(&self) -> i16 {
        self.year
    }

    /// Days from 1970-01-01 to January 1 of the epoch year
    pub const fn days_from_unix(&self) -> i32 {
        self.days_from_unix
    }

    /// First year whose conversions are trustworthy
    pub const fn valid_year_lower(&self) -> i16 {
        self.year - VALID_YEAR_SPAN
    }

    /// First year past the trustworthy range
    pub const fn valid_year_upper(&self) -> i16 {
        self.year + VALID_YEAR_SPAN
    }

    pub const fn is_year_valid(&self, year: i16) -> bool {
        year >= self.valid_year_lower() && year < self.valid_year_upper()
    }

    /// Days since the epoch for a civil date
    pub const fn days_from_civil(&self, year: i16, month: u8, day: u8) -> i32 {
        unix_days_from_civil(year, month, day) - self.days_from_unix
    }

    /// Civil date for a count of days since the epoch
    pub const fn civil_from_days(&self, days: i32) -> CivilDate {
        civil_from_unix_days(days + self.days_from_unix)
    }

    pub const fn to_unix(&self, secs: EpochSeconds) -> UnixSeconds {
        UnixSeconds(secs.0 + self.days_from_unix as i64 * SECONDS_PER_DAY)
    }

    pub const fn from_unix(&self, secs: UnixSeconds) -> EpochSeconds {
        EpochSeconds(secs.0 - self.days_from_unix as i64 * SECONDS_PER_DAY)
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCH_YEAR)
    }
}

static CURRENT_EPOCH: Mutex<Cell<Epoch>> = Mutex::new(Cell::new(Epoch::new(DEFAULT_EPOCH_YEAR)));

pub fn current_epoch_year() -> i16 {
    Epoch::current().year()
}

/// Move the process-wide epoch
///
/// All `EpochSeconds` and zoned values computed before the call are stale
/// afterwards.
pub fn set_current_epoch_year(year: i16) {
    let epoch = Epoch::new(year);
    critical_section::with(|cs| CURRENT_EPOCH.borrow(cs).set(epoch));
    info!("Epoch year set to {}", year);
}

#[cfg(test)]
pub(crate) static EPOCH_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
