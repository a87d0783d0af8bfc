//! Proleptic Gregorian calendar arithmetic
//!
//! Conversions use Howard Hinnant's era-based days-from-civil algorithms.
//! Reference: <https://howardhinnant.github.io/date_algorithms.html>
//!
//! Inputs are not validated. Callers guarantee a calendar-valid date with a
//! year in `[1, 9999]`; anything else yields an unspecified result.

use core::fmt::Write;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// ISO weekday numbers
pub mod weekday {
    pub const MONDAY: u8 = 1;
    pub const TUESDAY: u8 = 2;
    pub const WEDNESDAY: u8 = 3;
    pub const THURSDAY: u8 = 4;
    pub const FRIDAY: u8 = 5;
    pub const SATURDAY: u8 = 6;
    pub const SUNDAY: u8 = 7;
}

/// Check if a year is a leap year in the Gregorian calendar
pub const fn is_leap_year(year: i16) -> bool {
    let y = year as i32;
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

/// Number of days in `month` (1-12) of `year`
pub const fn days_in_month(year: i16, month: u8) -> u8 {
    const DAYS: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS[(month - 1) as usize]
    }
}

/// Days since 1970-01-01 for a civil date
pub const fn unix_days_from_civil(year: i16, month: u8, day: u8) -> i32 {
    let y = if month <= 2 {
        year as i32 - 1
    } else {
        year as i32
    };
    let era = (if y >= 0 { y } else { y - 399 }) / 400;
    let yoe = y - era * 400; // [0, 399]
    let m = month as i32;
    let mp = if m > 2 { m - 3 } else { m + 9 }; // March = 0
    let doy = (153 * mp + 2) / 5 + day as i32 - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]
    era * 146_097 + doe - 719_468
}

/// Civil date for a count of days since 1970-01-01
pub const fn civil_from_unix_days(days: i32) -> CivilDate {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };
    CivilDate {
        year: year as i16,
        month: month as u8,
        day: day as u8,
    }
}

/// ISO weekday (Monday = 1 .. Sunday = 7)
pub const fn day_of_week(year: i16, month: u8, day: u8) -> u8 {
    // 1970-01-01 was a Thursday
    ((unix_days_from_civil(year, month, day) + 3).rem_euclid(7) + 1) as u8
}

/// Seconds elapsed since midnight
pub const fn local_time_to_seconds(hour: u8, minute: u8, second: u8) -> i32 {
    hour as i32 * 3600 + minute as i32 * 60 + second as i32
}

/// A calendar date without time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CivilDate {
    pub year: i16,
    pub month: u8,
    pub day: u8,
}

impl CivilDate {
    pub const fn new(year: i16, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    pub const fn unix_days(&self) -> i32 {
        unix_days_from_civil(self.year, self.month, self.day)
    }

    pub const fn day_of_week(&self) -> u8 {
        day_of_week(self.year, self.month, self.day)
    }

    /// Advance by one day, rolling over month and year
    pub fn increment_day(&mut self) {
        if self.day < days_in_month(self.year, self.month) {
            self.day += 1;
        } else if self.month < 12 {
            self.day = 1;
            self.month += 1;
        } else {
            self.day = 1;
            self.month = 1;
            self.year += 1;
        }
    }

    /// Step back by one day, rolling over month and year
    pub fn decrement_day(&mut self) {
        if self.day > 1 {
            self.day -= 1;
        } else if self.month > 1 {
            self.month -= 1;
            self.day = days_in_month(self.year, self.month);
        } else {
            self.year -= 1;
            self.month = 12;
            self.day = 31;
        }
    }
}

/// A calendar date and wall-clock time with no zone attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CivilDateTime {
    pub year: i16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilDateTime {
    pub const fn new(year: i16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    pub const fn date(&self) -> CivilDate {
        CivilDate::new(self.year, self.month, self.day)
    }

    pub const fn seconds_of_day(&self) -> i32 {
        local_time_to_seconds(self.hour, self.minute, self.second)
    }

    /// Break a count of seconds since 1970-01-01T00:00:00 into fields
    ///
    /// The count is taken at face value: pass local seconds to get local
    /// fields.
    pub const fn from_unix_seconds(secs: i64) -> Self {
        let days = secs.div_euclid(SECONDS_PER_DAY) as i32;
        let sod = secs.rem_euclid(SECONDS_PER_DAY) as i32;
        let date = civil_from_unix_days(days);
        Self {
            year: date.year,
            month: date.month,
            day: date.day,
            hour: (sod / 3600) as u8,
            minute: ((sod % 3600) / 60) as u8,
            second: (sod % 60) as u8,
        }
    }

    /// Seconds since 1970-01-01T00:00:00 reading the fields at face value
    pub const fn to_unix_seconds(&self) -> i64 {
        unix_days_from_civil(self.year, self.month, self.day) as i64 * SECONDS_PER_DAY
            + self.seconds_of_day() as i64
    }

    /// Render as `DD-MM-YYYY hh:mm:ss`
    pub fn timestamp(&self) -> heapless::String<24> {
        let mut s = heapless::String::new();
        // 24 bytes covers every year in [1, 9999]
        let _ = write!(
            s,
            "{:02}-{:02}-{} {:02}:{:02}:{:02}",
            self.day, self.month, self.year, self.hour, self.minute, self.second
        );
        s
    }
}

impl core::fmt::Display for CivilDateTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_leap_year() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
        assert!(!is_leap_year(2100));
    }

    #[test]
    fn test_unix_epoch() {
        assert_eq!(unix_days_from_civil(1970, 1, 1), 0);
        assert_eq!(civil_from_unix_days(0), CivilDate::new(1970, 1, 1));
        assert_eq!(civil_from_unix_days(-1), CivilDate::new(1969, 12, 31));
    }

    #[test]
    fn test_known_dates() {
        // 2000-01-01 is 10957 days after the unix epoch
        assert_eq!(unix_days_from_civil(2000, 1, 1), 10_957);
        assert_eq!(unix_days_from_civil(2050, 1, 1), 29_220);
        assert_eq!(unix_days_from_civil(1, 1, 1), -719_162);
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2023, 4), 30);
        assert_eq!(days_in_month(2023, 12), 31);
    }

    #[test]
    fn test_day_of_week() {
        assert_eq!(day_of_week(1970, 1, 1), weekday::THURSDAY);
        assert_eq!(day_of_week(2000, 1, 1), weekday::SATURDAY);
        assert_eq!(day_of_week(2024, 3, 10), weekday::SUNDAY);
        assert_eq!(day_of_week(1969, 12, 29), weekday::MONDAY);
    }

    #[test]
    fn test_leap_day_2024() {
        let dt = CivilDateTime::from_unix_seconds(1_709_164_800);
        assert_eq!(dt, CivilDateTime::new(2024, 2, 29, 0, 0, 0));
    }

    #[test]
    fn test_end_of_century() {
        let dt = CivilDateTime::new(1999, 12, 31, 23, 59, 59);
        let next = CivilDateTime::from_unix_seconds(dt.to_unix_seconds() + 1);
        assert_eq!(next, CivilDateTime::new(2000, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_negative_seconds_break_down_before_1970() {
        let dt = CivilDateTime::from_unix_seconds(-1);
        assert_eq!(dt, CivilDateTime::new(1969, 12, 31, 23, 59, 59));
    }

    #[test]
    fn test_increment_and_decrement_roll_over() {
        let mut d = CivilDate::new(2023, 12, 31);
        d.increment_day();
        assert_eq!(d, CivilDate::new(2024, 1, 1));
        d.decrement_day();
        assert_eq!(d, CivilDate::new(2023, 12, 31));

        let mut leap = CivilDate::new(2024, 2, 28);
        leap.increment_day();
        assert_eq!(leap, CivilDate::new(2024, 2, 29));
        leap.increment_day();
        assert_eq!(leap, CivilDate::new(2024, 3, 1));
        leap.decrement_day();
        assert_eq!(leap, CivilDate::new(2024, 2, 29));
    }

    #[test]
    fn test_timestamp_rendering() {
        let dt = CivilDateTime::new(2024, 3, 5, 7, 8, 9);
        assert_eq!(dt.timestamp().as_str(), "05-03-2024 07:08:09");
    }

    #[test]
    fn test_local_time_to_seconds() {
        assert_eq!(local_time_to_seconds(0, 0, 0), 0);
        assert_eq!(local_time_to_seconds(23, 59, 59), 86_399);
    }

    fn civil_date() -> impl Strategy<Value = (i16, u8, u8)> {
        (1i16..=9999, 1u8..=12).prop_flat_map(|(y, m)| {
            (Just(y), Just(m), 1u8..=days_in_month(y, m))
        })
    }

    proptest! {
        #[test]
        fn prop_days_round_trip((y, m, d) in civil_date()) {
            let days = unix_days_from_civil(y, m, d);
            prop_assert_eq!(civil_from_unix_days(days), CivilDate::new(y, m, d));
        }

        #[test]
        fn prop_increment_matches_day_count((y, m, d) in civil_date()) {
            prop_assume!(!(y == 9999 && m == 12 && d == 31));
            let mut date = CivilDate::new(y, m, d);
            date.increment_day();
            prop_assert_eq!(date.unix_days(), unix_days_from_civil(y, m, d) + 1);
        }

        #[test]
        fn prop_weekday_advances_by_one((y, m, d) in civil_date()) {
            prop_assume!(!(y == 9999 && m == 12 && d == 31));
            let mut next = CivilDate::new(y, m, d);
            next.increment_day();
            prop_assert_eq!(next.day_of_week(), day_of_week(y, m, d) % 7 + 1);
        }
    }
}
