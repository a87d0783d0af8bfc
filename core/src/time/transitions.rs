//! Offset transitions around a target year
//!
//! Builds the transitions of one zone over `year - 1 ..= year + 1`, plus the
//! state in force when that window opens. Each transition records its start
//! twice: as a wall-clock instant in the frame of the offset it replaces,
//! and as UTC.

use super::calendar::{unix_days_from_civil, SECONDS_PER_DAY};
use super::zone::{EraDst, TimeSuffix, ZoneEra, ZoneInfo};

/// Upper bound on transitions in one window
pub const MAX_TRANSITIONS: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct Transition {
    /// Wall-clock start in the previous offset's frame
    pub start_wall: i64,
    pub start_utc: i64,
    pub std_seconds: i32,
    pub dst_seconds: i32,
    pub format: &'static str,
    pub letter: &'static str,
}

impl Transition {
    pub const fn total_offset(&self) -> i32 {
        self.std_seconds + self.dst_seconds
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    raw: i64,
    suffix: TimeSuffix,
    std_seconds: i32,
    dst_seconds: i32,
    format: &'static str,
    letter: &'static str,
}

/// Transitions of one zone, ordered by start
#[derive(Debug)]
pub struct TransitionWindow {
    transitions: heapless::Vec<Transition, MAX_TRANSITIONS>,
}

impl TransitionWindow {
    pub fn for_year(zone: &ZoneInfo, year: i16) -> Self {
        let window_start = year_start(year - 1);
        let window_end = year_start(year + 2);

        let mut candidates: heapless::Vec<Candidate, MAX_TRANSITIONS> = heapless::Vec::new();
        let mut era_start: Option<(i64, TimeSuffix)> = None;

        for era in zone.eras {
            let era_end = era.until.map_or(i64::MAX, |u| u.raw_local_seconds());
            let next_start = era.until.map(|u| (u.raw_local_seconds(), u.suffix));

            if era_end <= window_start {
                era_start = next_start;
                continue;
            }
            let begins_in_window = matches!(era_start, Some((raw, _)) if raw > window_start);
            if let Some((raw, _)) = era_start {
                if raw >= window_end {
                    break;
                }
            }
            // The opening state of the first overlapping era is in force
            // from the beginning of time as far as this window is concerned.
            let (anchor, suffix) = match era_start {
                Some((raw, suffix)) if begins_in_window => (raw, suffix),
                _ if candidates.is_empty() => (i64::MIN, TimeSuffix::Wall),
                _ => (window_start, TimeSuffix::Wall),
            };
            let lookup_from = anchor.max(window_start);
            push_era(&mut candidates, era, anchor, suffix, lookup_from, era_end, year, window_end);
            era_start = next_start;
        }

        candidates.sort_unstable_by_key(|c| c.raw);

        let mut transitions = heapless::Vec::new();
        let mut prev: Option<(i32, i32)> = None;
        for c in &candidates {
            let (start_wall, start_utc) = match prev {
                None => (i64::MIN, i64::MIN),
                Some((std, dst)) => {
                    let wall = match c.suffix {
                        TimeSuffix::Wall => c.raw,
                        TimeSuffix::Standard => c.raw + dst as i64,
                        TimeSuffix::Utc => c.raw + (std + dst) as i64,
                    };
                    (wall, wall - (std + dst) as i64)
                }
            };
            let _ = transitions.push(Transition {
                start_wall,
                start_utc,
                std_seconds: c.std_seconds,
                dst_seconds: c.dst_seconds,
                format: c.format,
                letter: c.letter,
            });
            prev = Some((c.std_seconds, c.dst_seconds));
        }
        Self { transitions }
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// The transition in force at a wall-clock instant
    ///
    /// The latest transition whose wall-clock start does not exceed `local`
    /// wins, so a repeated hour keeps the earlier offset and a skipped hour
    /// takes the offset of the transition that skips it.
    pub fn find_for_local(&self, local: i64) -> Option<&Transition> {
        self.transitions.iter().rev().find(|t| t.start_wall <= local)
    }

    /// The transition in force at a UTC instant
    pub fn find_for_utc(&self, utc: i64) -> Option<&Transition> {
        self.transitions.iter().rev().find(|t| t.start_utc <= utc)
    }
}

fn year_start(year: i16) -> i64 {
    unix_days_from_civil(year, 1, 1) as i64 * SECONDS_PER_DAY
}

#[allow(clippy::too_many_arguments)]
fn push_era(
    out: &mut heapless::Vec<Candidate, MAX_TRANSITIONS>,
    era: &ZoneEra,
    anchor: i64,
    suffix: TimeSuffix,
    lookup_from: i64,
    era_end: i64,
    year: i16,
    window_end: i64,
) {
    match era.dst {
        EraDst::Fixed(dst) => {
            push(out, Candidate {
                raw: anchor,
                suffix,
                std_seconds: era.std_seconds,
                dst_seconds: dst,
                format: era.format,
                letter: "",
            });
        }
        EraDst::Policy(policy) => {
            let opening = policy.latest_before(lookup_from);
            push(out, Candidate {
                raw: anchor,
                suffix,
                std_seconds: era.std_seconds,
                dst_seconds: opening.map_or(0, |r| r.dst_seconds),
                format: era.format,
                letter: opening.map_or("", |r| r.letter),
            });
            for y in (year - 1)..=(year + 1) {
                for rule in policy.rules.iter().filter(|r| r.is_active_in(y)) {
                    let raw = rule.raw_local_seconds(y);
                    if raw <= lookup_from || raw >= era_end || raw >= window_end {
                        continue;
                    }
                    push(out, Candidate {
                        raw,
                        suffix: rule.at_suffix,
                        std_seconds: era.std_seconds,
                        dst_seconds: rule.dst_seconds,
                        format: era.format,
                        letter: rule.letter,
                    });
                }
            }
        }
    }
}

fn push(out: &mut heapless::Vec<Candidate, MAX_TRANSITIONS>, candidate: Candidate) {
    if out.push(candidate).is_err() {
        warn!("Transition window full, dropping transition at {}", candidate.raw);
    }
}
