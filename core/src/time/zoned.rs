//! Zone-aware date-times

use super::calendar::CivilDateTime;
use super::epoch::{Epoch, EpochSeconds, UnixSeconds};
use super::transitions::{Transition, TransitionWindow};
use super::zone::{format_abbreviation, ZoneInfo, ABBREV_CAPACITY};

/// A civil date-time bound to a zone with its resolved offsets
#[derive(Debug, Clone, Copy)]
pub struct ZonedDateTime<'z> {
    civil: CivilDateTime,
    zone: &'z ZoneInfo,
    std_seconds: i32,
    dst_seconds: i32,
    format: &'static str,
    letter: &'static str,
}

impl<'z> ZonedDateTime<'z> {
    /// Attach `zone` to a wall-clock reading
    ///
    /// Rules are walked over the target year +-1; the latest transition
    /// whose wall-clock start does not exceed `civil` decides the offset.
    pub fn resolve(civil: CivilDateTime, zone: &'z ZoneInfo) -> Self {
        let window = TransitionWindow::for_year(zone, civil.year);
        let local = civil.to_unix_seconds();
        Self::with_transition(civil, zone, window.find_for_local(local))
    }

    /// The wall-clock reading in `zone` at a unix instant
    pub fn from_unix_seconds(secs: UnixSeconds, zone: &'z ZoneInfo) -> Self {
        let utc_year = CivilDateTime::from_unix_seconds(secs.0).year;
        let window = TransitionWindow::for_year(zone, utc_year);
        let transition = window.find_for_utc(secs.0);
        let offset = transition.map_or(0, Transition::total_offset);
        let civil = CivilDateTime::from_unix_seconds(secs.0 + offset as i64);
        Self::with_transition(civil, zone, transition)
    }

    /// The wall-clock reading in `zone` at an instant relative to `epoch`
    pub fn from_epoch_seconds_in(epoch: Epoch, secs: EpochSeconds, zone: &'z ZoneInfo) -> Self {
        Self::from_unix_seconds(epoch.to_unix(secs), zone)
    }

    /// Same as [`ZonedDateTime::from_epoch_seconds_in`] against the current epoch
    pub fn from_epoch_seconds(secs: EpochSeconds, zone: &'z ZoneInfo) -> Self {
        Self::from_epoch_seconds_in(Epoch::current(), secs, zone)
    }

    fn with_transition(civil: CivilDateTime, zone: &'z ZoneInfo, t: Option<&Transition>) -> Self {
        match t {
            Some(t) => Self {
                civil,
                zone,
                std_seconds: t.std_seconds,
                dst_seconds: t.dst_seconds,
                format: t.format,
                letter: t.letter,
            },
            None => {
                warn!("Zone {} has no era covering {}", zone.name, civil.year);
                Self {
                    civil,
                    zone,
                    std_seconds: 0,
                    dst_seconds: 0,
                    format: "UTC",
                    letter: "",
                }
            }
        }
    }

    pub fn civil(&self) -> CivilDateTime {
        self.civil
    }

    pub fn zone(&self) -> &'z ZoneInfo {
        self.zone
    }

    pub fn std_offset_seconds(&self) -> i32 {
        self.std_seconds
    }

    pub fn dst_offset_seconds(&self) -> i32 {
        self.dst_seconds
    }

    pub fn total_offset_seconds(&self) -> i32 {
        self.std_seconds + self.dst_seconds
    }

    pub fn is_dst(&self) -> bool {
        self.dst_seconds != 0
    }

    pub fn abbreviation(&self) -> heapless::String<ABBREV_CAPACITY> {
        format_abbreviation(self.format, self.letter, self.dst_seconds)
    }

    pub fn to_unix_seconds(&self) -> UnixSeconds {
        UnixSeconds(self.civil.to_unix_seconds() - self.total_offset_seconds() as i64)
    }

    pub fn to_epoch_seconds_in(&self, epoch: Epoch) -> EpochSeconds {
        epoch.from_unix(self.to_unix_seconds())
    }

    pub fn to_epoch_seconds(&self) -> EpochSeconds {
        self.to_epoch_seconds_in(Epoch::current())
    }

    /// The same instant seen from another zone
    pub fn convert<'b>(&self, zone: &'b ZoneInfo) -> ZonedDateTime<'b> {
        let epoch = Epoch::current();
        ZonedDateTime::from_epoch_seconds_in(epoch, self.to_epoch_seconds_in(epoch), zone)
    }
}

impl core::fmt::Display for ZonedDateTime<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let offset = self.total_offset_seconds();
        let sign = if offset < 0 { '-' } else { '+' };
        let abs = offset.unsigned_abs();
        write!(
            f,
            "{}{}{:02}:{:02}[{}]",
            self.civil,
            sign,
            abs / 3600,
            (abs % 3600) / 60,
            self.zone.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::zonedb::{
        AMERICA_LOS_ANGELES, AMERICA_NEW_YORK, ASIA_COLOMBO, ASIA_SHANGHAI, AUSTRALIA_DARWIN,
        AUSTRALIA_SYDNEY, ETC_UTC, EUROPE_LISBON, EUROPE_LONDON,
    };
    use std::string::ToString;

    const H: i32 = 3600;

    fn offset_at(zone: &ZoneInfo, y: i16, mo: u8, d: u8, h: u8, mi: u8) -> i32 {
        ZonedDateTime::resolve(CivilDateTime::new(y, mo, d, h, mi, 0), zone).total_offset_seconds()
    }

    #[test]
    fn test_new_york_spring_forward() {
        // 2024-03-10 02:00 EST jumps to 03:00 EDT
        assert_eq!(offset_at(&AMERICA_NEW_YORK, 2024, 3, 10, 1, 59), -5 * H);
        assert_eq!(offset_at(&AMERICA_NEW_YORK, 2024, 3, 10, 3, 0), -4 * H);
        // A skipped wall time takes the offset of the rule that skips it
        assert_eq!(offset_at(&AMERICA_NEW_YORK, 2024, 3, 10, 2, 30), -4 * H);
    }

    #[test]
    fn test_new_york_fall_back() {
        assert_eq!(offset_at(&AMERICA_NEW_YORK, 2024, 11, 3, 0, 30), -4 * H);
        // The repeated hour keeps daylight time
        assert_eq!(offset_at(&AMERICA_NEW_YORK, 2024, 11, 3, 1, 30), -4 * H);
        assert_eq!(offset_at(&AMERICA_NEW_YORK, 2024, 11, 3, 2, 30), -5 * H);
    }

    #[test]
    fn test_pre_2007_us_rules() {
        // 2006: first Sunday of April to last Sunday of October
        assert_eq!(offset_at(&AMERICA_LOS_ANGELES, 2006, 4, 1, 12, 0), -8 * H);
        assert_eq!(offset_at(&AMERICA_LOS_ANGELES, 2006, 4, 2, 12, 0), -7 * H);
        assert_eq!(offset_at(&AMERICA_LOS_ANGELES, 2006, 10, 29, 12, 0), -8 * H);
    }

    #[test]
    fn test_abbreviations() {
        let summer = ZonedDateTime::resolve(CivilDateTime::new(2024, 7, 1, 12, 0, 0), &AMERICA_NEW_YORK);
        assert_eq!(summer.abbreviation().as_str(), "EDT");
        assert!(summer.is_dst());
        let winter = ZonedDateTime::resolve(CivilDateTime::new(2024, 1, 1, 12, 0, 0), &EUROPE_LONDON);
        assert_eq!(winter.abbreviation().as_str(), "GMT");
        let bst = ZonedDateTime::resolve(CivilDateTime::new(2024, 6, 1, 12, 0, 0), &EUROPE_LONDON);
        assert_eq!(bst.abbreviation().as_str(), "BST");
        let lisbon = ZonedDateTime::resolve(CivilDateTime::new(2024, 1, 1, 12, 0, 0), &EUROPE_LISBON);
        assert_eq!(lisbon.abbreviation().as_str(), "WET");
        let colombo = ZonedDateTime::resolve(CivilDateTime::new(2024, 1, 1, 12, 0, 0), &ASIA_COLOMBO);
        assert_eq!(colombo.abbreviation().as_str(), "+0530");
    }

    #[test]
    fn test_london_transitions_at_one_utc() {
        // 2024-03-31 01:00 UTC
        let before = UnixSeconds(1_711_846_800 - 1);
        let after = UnixSeconds(1_711_846_800);
        assert_eq!(ZonedDateTime::from_unix_seconds(before, &EUROPE_LONDON).total_offset_seconds(), 0);
        let bst = ZonedDateTime::from_unix_seconds(after, &EUROPE_LONDON);
        assert_eq!(bst.total_offset_seconds(), H);
        assert_eq!(bst.civil(), CivilDateTime::new(2024, 3, 31, 2, 0, 0));
    }

    #[test]
    fn test_lisbon_switch_from_central_european_time() {
        assert_eq!(offset_at(&EUROPE_LISBON, 1996, 1, 15, 12, 0), H);
        assert_eq!(offset_at(&EUROPE_LISBON, 1996, 6, 15, 12, 0), H);
        assert_eq!(offset_at(&EUROPE_LISBON, 1996, 12, 15, 12, 0), 0);
    }

    #[test]
    fn test_sydney_southern_hemisphere() {
        assert_eq!(offset_at(&AUSTRALIA_SYDNEY, 2024, 1, 15, 12, 0), 11 * H);
        assert_eq!(offset_at(&AUSTRALIA_SYDNEY, 2024, 7, 1, 12, 0), 10 * H);
        // DST ends 2024-04-07 03:00 AEDT
        assert_eq!(offset_at(&AUSTRALIA_SYDNEY, 2024, 4, 7, 1, 0), 11 * H);
        assert_eq!(offset_at(&AUSTRALIA_SYDNEY, 2024, 4, 7, 4, 0), 10 * H);
        // DST starts 2024-10-06 02:00 AEST
        assert_eq!(offset_at(&AUSTRALIA_SYDNEY, 2024, 10, 6, 3, 0), 11 * H);
        // Olympic year started early
        assert_eq!(offset_at(&AUSTRALIA_SYDNEY, 2000, 9, 15, 12, 0), 11 * H);
    }

    #[test]
    fn test_colombo_era_change() {
        assert_eq!(offset_at(&ASIA_COLOMBO, 2006, 4, 14, 12, 0), 6 * H);
        assert_eq!(offset_at(&ASIA_COLOMBO, 2006, 4, 16, 12, 0), 5 * H + 1800);
        assert_eq!(offset_at(&ASIA_COLOMBO, 2000, 1, 1, 0, 0), 6 * H);
    }

    #[test]
    fn test_fixed_zones() {
        assert_eq!(offset_at(&AUSTRALIA_DARWIN, 2024, 1, 1, 0, 0), 9 * H + 1800);
        assert_eq!(offset_at(&ASIA_SHANGHAI, 2024, 7, 1, 0, 0), 8 * H);
        assert_eq!(offset_at(&ETC_UTC, 2024, 7, 1, 0, 0), 0);
    }

    #[test]
    fn test_convert_shanghai_to_colombo() {
        let shanghai = ZonedDateTime::resolve(CivilDateTime::new(2024, 1, 1, 12, 0, 0), &ASIA_SHANGHAI);
        let colombo = shanghai.convert(&ASIA_COLOMBO);
        assert_eq!(colombo.civil(), CivilDateTime::new(2024, 1, 1, 9, 30, 0));
        assert_eq!(colombo.to_unix_seconds(), shanghai.to_unix_seconds());
    }

    #[test]
    fn test_convert_across_date_line() {
        let ny = ZonedDateTime::resolve(CivilDateTime::new(2024, 12, 31, 20, 0, 0), &AMERICA_NEW_YORK);
        let sydney = ny.convert(&AUSTRALIA_SYDNEY);
        assert_eq!(sydney.civil(), CivilDateTime::new(2025, 1, 1, 12, 0, 0));
    }

    #[test]
    fn test_epoch_round_trip_through_zone() {
        let epoch = Epoch::new(2050);
        let dt = ZonedDateTime::resolve(CivilDateTime::new(2024, 7, 4, 9, 15, 30), &AMERICA_NEW_YORK);
        let secs = dt.to_epoch_seconds_in(epoch);
        let back = ZonedDateTime::from_epoch_seconds_in(epoch, secs, &AMERICA_NEW_YORK);
        assert_eq!(back.civil(), dt.civil());
        assert_eq!(back.total_offset_seconds(), dt.total_offset_seconds());
    }

    #[test]
    fn test_display() {
        let dt = ZonedDateTime::resolve(CivilDateTime::new(2024, 3, 10, 3, 30, 0), &AMERICA_NEW_YORK);
        assert_eq!(dt.to_string(), "2024-03-10T03:30:00-04:00[America/New_York]");
    }
}
