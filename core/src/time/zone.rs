//! Zone rule data model
//!
//! A zone is an ordered list of eras. Each era has a standard offset and
//! either a fixed DST delta or a named rule policy, and lasts until its
//! `until` boundary. Everything here is `'static` data borrowed by the
//! resolver; nothing is copied or mutated at runtime.

use core::fmt::Write;

use super::calendar::{day_of_week, days_in_month, unix_days_from_civil, SECONDS_PER_DAY};

/// Last year a rule can name
pub const MAX_YEAR: i16 = 9999;

/// Frame in which a transition time-of-day is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeSuffix {
    /// Local wall clock in force before the transition (`w`)
    Wall,
    /// Local standard time (`s`)
    Standard,
    /// UTC (`u`)
    Utc,
}

/// Day-of-month selector of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DaySelector {
    /// A fixed day of the month
    Exact(u8),
    /// First `weekday` on or after `day` (`Sun>=8`)
    OnOrAfter { weekday: u8, day: u8 },
    /// Last `weekday` on or before `day` (`Sun<=25`)
    OnOrBefore { weekday: u8, day: u8 },
    /// Last `weekday` of the month (`lastSun`)
    Last { weekday: u8 },
}

impl DaySelector {
    pub const fn day_in(&self, year: i16, month: u8) -> u8 {
        match *self {
            DaySelector::Exact(day) => day,
            DaySelector::OnOrAfter { weekday, day } => {
                let dow = day_of_week(year, month, day);
                day + (weekday + 7 - dow) % 7
            }
            DaySelector::OnOrBefore { weekday, day } => {
                let dow = day_of_week(year, month, day);
                day - (dow + 7 - weekday) % 7
            }
            DaySelector::Last { weekday } => {
                let last = days_in_month(year, month);
                let dow = day_of_week(year, month, last);
                last - (dow + 7 - weekday) % 7
            }
        }
    }
}

/// One line of a rule policy
#[derive(Debug, Clone, Copy)]
pub struct ZoneRule {
    pub from_year: i16,
    /// Inclusive; [`MAX_YEAR`] for open-ended rules
    pub to_year: i16,
    pub month: u8,
    pub on: DaySelector,
    pub at_seconds: i32,
    pub at_suffix: TimeSuffix,
    /// DST delta in force after the transition
    pub dst_seconds: i32,
    /// Substituted for `%s` in the era format
    pub letter: &'static str,
}

impl ZoneRule {
    pub const fn is_active_in(&self, year: i16) -> bool {
        year >= self.from_year && year <= self.to_year
    }

    /// Transition instant in `year`, as local seconds in the rule's own
    /// suffix frame
    pub const fn raw_local_seconds(&self, year: i16) -> i64 {
        let day = self.on.day_in(year, self.month);
        unix_days_from_civil(year, self.month, day) as i64 * SECONDS_PER_DAY
            + self.at_seconds as i64
    }
}

/// A named set of rules shared by several zones
#[derive(Debug)]
pub struct ZonePolicy {
    pub name: &'static str,
    pub rules: &'static [ZoneRule],
}

impl ZonePolicy {
    /// Latest rule transition at or before `limit`
    ///
    /// Only the raw instants are compared, which is enough to pick the
    /// state an era starts in.
    pub fn latest_before(&self, limit: i64) -> Option<&'static ZoneRule> {
        let limit_year = super::calendar::civil_from_unix_days(
            limit.div_euclid(SECONDS_PER_DAY) as i32,
        )
        .year;
        let mut best: Option<(i64, &'static ZoneRule)> = None;
        for rule in self.rules {
            let mut year = if rule.to_year < limit_year {
                rule.to_year
            } else {
                limit_year
            };
            if year < rule.from_year {
                continue;
            }
            let mut raw = rule.raw_local_seconds(year);
            if raw > limit {
                year -= 1;
                if year < rule.from_year {
                    continue;
                }
                raw = rule.raw_local_seconds(year);
            }
            if best.map_or(true, |(b, _)| raw > b) {
                best = Some((raw, rule));
            }
        }
        best.map(|(_, rule)| rule)
    }
}

/// DST handling of an era
#[derive(Debug, Clone, Copy)]
pub enum EraDst {
    Fixed(i32),
    Policy(&'static ZonePolicy),
}

/// End of an era, expressed in the era's own local frame
#[derive(Debug, Clone, Copy)]
pub struct EraUntil {
    pub year: i16,
    pub month: u8,
    pub day: u8,
    pub seconds: i32,
    pub suffix: TimeSuffix,
}

impl EraUntil {
    pub const fn raw_local_seconds(&self) -> i64 {
        unix_days_from_civil(self.year, self.month, self.day) as i64 * SECONDS_PER_DAY
            + self.seconds as i64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZoneEra {
    pub std_seconds: i32,
    pub dst: EraDst,
    /// Abbreviation template: literal, `%s` letter slot, or `STD/DST`
    pub format: &'static str,
    /// `None` for the final era
    pub until: Option<EraUntil>,
}

/// A time zone: an identifier plus its ordered eras
#[derive(Debug)]
pub struct ZoneInfo {
    pub name: &'static str,
    pub eras: &'static [ZoneEra],
}

impl ZoneInfo {
    /// The identifier without its region prefix (`New_York`)
    pub fn short_name(&self) -> &'static str {
        let name = self.name;
        match name.rfind('/') {
            Some(i) => &name[i + 1..],
            None => name,
        }
    }
}

impl PartialEq for ZoneInfo {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }
}

impl Eq for ZoneInfo {}

/// Longest abbreviation the templates produce
pub const ABBREV_CAPACITY: usize = 8;

/// Expand an era format into an abbreviation
///
/// `STD/DST` pairs pick a side by `dst_seconds`; `%s` is replaced by the
/// rule letter, where `-` stands for the empty letter.
pub fn format_abbreviation(
    format: &str,
    letter: &str,
    dst_seconds: i32,
) -> heapless::String<ABBREV_CAPACITY> {
    let mut out = heapless::String::new();
    if let Some((std, dst)) = format.split_once('/') {
        let _ = out.push_str(if dst_seconds == 0 { std } else { dst });
    } else if let Some((head, tail)) = format.split_once("%s") {
        let letter = if letter == "-" { "" } else { letter };
        let _ = write!(out, "{}{}{}", head, letter, tail);
    } else {
        let _ = out.push_str(format);
    }
    out
}
