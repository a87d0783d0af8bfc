//! Built-in zone database
//!
//! A small hand-maintained subset of the IANA tz database. Rules before
//! 1990 are omitted, so results are reliable from 1990 onwards.

use super::calendar::weekday::SUNDAY;
use super::zone::{
    DaySelector, EraDst, EraUntil, TimeSuffix, ZoneEra, ZoneInfo, ZonePolicy, ZoneRule, MAX_YEAR,
};

const HOUR: i32 = 3600;
const MINUTE: i32 = 60;

#[allow(clippy::too_many_arguments)]
const fn rule(
    from_year: i16,
    to_year: i16,
    month: u8,
    on: DaySelector,
    at_seconds: i32,
    at_suffix: TimeSuffix,
    dst_seconds: i32,
    letter: &'static str,
) -> ZoneRule {
    ZoneRule {
        from_year,
        to_year,
        month,
        on,
        at_seconds,
        at_suffix,
        dst_seconds,
        letter,
    }
}

const fn fixed(std_seconds: i32, format: &'static str) -> ZoneEra {
    ZoneEra {
        std_seconds,
        dst: EraDst::Fixed(0),
        format,
        until: None,
    }
}

const fn until(year: i16, month: u8, day: u8, seconds: i32, suffix: TimeSuffix) -> Option<EraUntil> {
    Some(EraUntil {
        year,
        month,
        day,
        seconds,
        suffix,
    })
}

const LAST_SUN: DaySelector = DaySelector::Last { weekday: SUNDAY };

const fn sun_on_or_after(day: u8) -> DaySelector {
    DaySelector::OnOrAfter {
        weekday: SUNDAY,
        day,
    }
}

// Rule US
static US_RULES: [ZoneRule; 4] = [
    rule(1967, 2006, 10, LAST_SUN, 2 * HOUR, TimeSuffix::Wall, 0, "S"),
    rule(1987, 2006, 4, sun_on_or_after(1), 2 * HOUR, TimeSuffix::Wall, HOUR, "D"),
    rule(2007, MAX_YEAR, 3, sun_on_or_after(8), 2 * HOUR, TimeSuffix::Wall, HOUR, "D"),
    rule(2007, MAX_YEAR, 11, sun_on_or_after(1), 2 * HOUR, TimeSuffix::Wall, 0, "S"),
];
static US: ZonePolicy = ZonePolicy {
    name: "US",
    rules: &US_RULES,
};

// Rule EU
static EU_RULES: [ZoneRule; 3] = [
    rule(1979, 1995, 9, LAST_SUN, HOUR, TimeSuffix::Utc, 0, "-"),
    rule(1981, MAX_YEAR, 3, LAST_SUN, HOUR, TimeSuffix::Utc, HOUR, "S"),
    rule(1996, MAX_YEAR, 10, LAST_SUN, HOUR, TimeSuffix::Utc, 0, "-"),
];
static EU: ZonePolicy = ZonePolicy {
    name: "EU",
    rules: &EU_RULES,
};

// Rule AN (New South Wales)
static AN_RULES: [ZoneRule; 9] = [
    rule(1987, 1999, 10, LAST_SUN, 2 * HOUR, TimeSuffix::Standard, HOUR, "D"),
    rule(1990, 1995, 3, sun_on_or_after(1), 2 * HOUR, TimeSuffix::Standard, 0, "S"),
    rule(1996, 2005, 3, LAST_SUN, 2 * HOUR, TimeSuffix::Standard, 0, "S"),
    rule(2000, 2000, 8, LAST_SUN, 2 * HOUR, TimeSuffix::Standard, HOUR, "D"),
    rule(2001, 2007, 10, LAST_SUN, 2 * HOUR, TimeSuffix::Standard, HOUR, "D"),
    rule(2006, 2006, 4, sun_on_or_after(1), 2 * HOUR, TimeSuffix::Standard, 0, "S"),
    rule(2007, 2007, 3, LAST_SUN, 2 * HOUR, TimeSuffix::Standard, 0, "S"),
    rule(2008, MAX_YEAR, 4, sun_on_or_after(1), 2 * HOUR, TimeSuffix::Standard, 0, "S"),
    rule(2008, MAX_YEAR, 10, sun_on_or_after(1), 2 * HOUR, TimeSuffix::Standard, HOUR, "D"),
];
static AN: ZonePolicy = ZonePolicy {
    name: "AN",
    rules: &AN_RULES,
};

pub static ETC_UTC: ZoneInfo = ZoneInfo {
    name: "Etc/UTC",
    eras: &[fixed(0, "UTC")],
};

pub static ASIA_COLOMBO: ZoneInfo = ZoneInfo {
    name: "Asia/Colombo",
    eras: &[
        ZoneEra {
            std_seconds: 6 * HOUR + 30 * MINUTE,
            dst: EraDst::Fixed(0),
            format: "+0630",
            until: until(1996, 10, 26, 30 * MINUTE, TimeSuffix::Wall),
        },
        ZoneEra {
            std_seconds: 6 * HOUR,
            dst: EraDst::Fixed(0),
            format: "+06",
            until: until(2006, 4, 15, 30 * MINUTE, TimeSuffix::Wall),
        },
        fixed(5 * HOUR + 30 * MINUTE, "+0530"),
    ],
};

pub static ASIA_SHANGHAI: ZoneInfo = ZoneInfo {
    name: "Asia/Shanghai",
    eras: &[fixed(8 * HOUR, "CST")],
};

pub static AMERICA_NEW_YORK: ZoneInfo = ZoneInfo {
    name: "America/New_York",
    eras: &[ZoneEra {
        std_seconds: -5 * HOUR,
        dst: EraDst::Policy(&US),
        format: "E%sT",
        until: None,
    }],
};

pub static AMERICA_LOS_ANGELES: ZoneInfo = ZoneInfo {
    name: "America/Los_Angeles",
    eras: &[ZoneEra {
        std_seconds: -8 * HOUR,
        dst: EraDst::Policy(&US),
        format: "P%sT",
        until: None,
    }],
};

pub static EUROPE_LONDON: ZoneInfo = ZoneInfo {
    name: "Europe/London",
    eras: &[ZoneEra {
        std_seconds: 0,
        dst: EraDst::Policy(&EU),
        format: "GMT/BST",
        until: None,
    }],
};

pub static EUROPE_LISBON: ZoneInfo = ZoneInfo {
    name: "Europe/Lisbon",
    eras: &[
        ZoneEra {
            std_seconds: HOUR,
            dst: EraDst::Policy(&EU),
            format: "CE%sT",
            until: until(1996, 3, 31, HOUR, TimeSuffix::Utc),
        },
        ZoneEra {
            std_seconds: 0,
            dst: EraDst::Policy(&EU),
            format: "WE%sT",
            until: None,
        },
    ],
};

pub static AUSTRALIA_SYDNEY: ZoneInfo = ZoneInfo {
    name: "Australia/Sydney",
    eras: &[ZoneEra {
        std_seconds: 10 * HOUR,
        dst: EraDst::Policy(&AN),
        format: "AE%sT",
        until: None,
    }],
};

pub static AUSTRALIA_DARWIN: ZoneInfo = ZoneInfo {
    name: "Australia/Darwin",
    eras: &[fixed(9 * HOUR + 30 * MINUTE, "ACST")],
};

/// Every zone in the database
pub static ZONES: [&ZoneInfo; 9] = [
    &ETC_UTC,
    &ASIA_COLOMBO,
    &ASIA_SHANGHAI,
    &AMERICA_NEW_YORK,
    &AMERICA_LOS_ANGELES,
    &EUROPE_LONDON,
    &EUROPE_LISBON,
    &AUSTRALIA_SYDNEY,
    &AUSTRALIA_DARWIN,
];

/// Alternate identifiers and the zone they name
pub static LINKS: [(&str, &ZoneInfo); 3] = [
    ("US/Pacific", &AMERICA_LOS_ANGELES),
    ("US/Eastern", &AMERICA_NEW_YORK),
    ("UTC", &ETC_UTC),
];

/// Look a zone up by identifier, following links
pub fn find_zone(name: &str) -> Option<&'static ZoneInfo> {
    ZONES
        .iter()
        .copied()
        .find(|z| z.name == name)
        .or_else(|| {
            LINKS
                .iter()
                .find(|(link, _)| *link == name)
                .map(|(_, zone)| *zone)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_zone_by_name() {
        let zone = find_zone("Asia/Colombo").map(|z| z.short_name());
        assert_eq!(zone, Some("Colombo"));
        assert!(find_zone("Mars/Olympus_Mons").is_none());
    }

    #[test]
    fn test_links_resolve_to_target() {
        assert_eq!(find_zone("US/Pacific"), Some(&AMERICA_LOS_ANGELES));
        assert_eq!(find_zone("UTC"), Some(&ETC_UTC));
    }

    #[test]
    fn test_zone_names_are_unique() {
        for (i, a) in ZONES.iter().enumerate() {
            for b in &ZONES[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }
}
