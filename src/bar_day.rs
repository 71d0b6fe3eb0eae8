//! Bar-day windowing
//!
//! A venue's operational day starts at a fixed clock hour (03:00 by
//! default) rather than midnight, so the full overnight session lands in a
//! single window. All per-day aggregates — occupancy baselines, dwell
//! windows, session stats — are scoped to the bar day, and learning slots
//! bucket each bar day into coarse weekday/time-of-day cells.
//!
//! Everything here is pure time arithmetic over reading timestamps; the
//! boundary hour is interpreted on the same clock the sensors stamp.

use crate::error::EngineError;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Default hour (0-23) at which a venue's operational day begins
pub const DEFAULT_BAR_DAY_START_HOUR: u32 = 3;

/// Width of a learning time slot in hours
pub const TIME_SLOT_HOURS: u32 = 3;

/// A single operational day: `[start, end)`, exactly 24 hours wide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarDay {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BarDay {
    /// Whether a timestamp falls inside this bar day.
    /// The start boundary is inclusive, the end boundary exclusive, so a
    /// reading stamped exactly at the boundary hour opens the new day.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    /// The bar day immediately before this one
    pub fn previous(&self) -> BarDay {
        BarDay {
            start: self.start - Duration::days(1),
            end: self.start,
        }
    }
}

/// Computes bar-day windows for a configured boundary hour.
///
/// Invalid boundary hours are a programming error and are rejected at
/// construction, never at computation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarDayClock {
    start_hour: u32,
}

impl Default for BarDayClock {
    fn default() -> Self {
        Self {
            start_hour: DEFAULT_BAR_DAY_START_HOUR,
        }
    }
}

impl BarDayClock {
    /// Create a clock with the given boundary hour (0-23)
    pub fn new(start_hour: u32) -> Result<Self, EngineError> {
        if start_hour > 23 {
            return Err(EngineError::InvalidBoundaryHour(start_hour));
        }
        Ok(Self { start_hour })
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    /// The bar day containing `now`: its start is the most recent
    /// occurrence of the boundary hour at or before `now`.
    pub fn current(&self, now: DateTime<Utc>) -> BarDay {
        let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let today_boundary = midnight + Duration::hours(self.start_hour as i64);
        let start = if now >= today_boundary {
            today_boundary
        } else {
            today_boundary - Duration::days(1)
        };
        BarDay {
            start,
            end: start + Duration::days(1),
        }
    }

    /// Alias of [`current`](Self::current) that reads better when scoping a
    /// historical timestamp rather than "now"
    pub fn containing(&self, ts: DateTime<Utc>) -> BarDay {
        self.current(ts)
    }
}

/// Coarse learning slot: weekday crossed with a 3-hour block, so "Friday
/// 9pm-midnight" accumulates its own profile distinct from "Tuesday
/// 9pm-midnight".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub weekday: Weekday,
    /// Start hour of the block (0, 3, 6, ... 21)
    pub block_start_hour: u32,
}

impl TimeSlot {
    /// The slot containing a timestamp
    pub fn containing(ts: DateTime<Utc>) -> TimeSlot {
        let block = ts.hour() / TIME_SLOT_HOURS * TIME_SLOT_HOURS;
        TimeSlot {
            weekday: ts.weekday(),
            block_start_hour: block,
        }
    }

    /// Stable string key used wherever slots index a JSON map, e.g. "fri-21"
    pub fn key(&self) -> String {
        format!("{}-{:02}", weekday_key(self.weekday), self.block_start_hour)
    }
}

fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_invalid_boundary_hour_rejected() {
        assert!(matches!(
            BarDayClock::new(24),
            Err(EngineError::InvalidBoundaryHour(24))
        ));
        assert!(BarDayClock::new(23).is_ok());
        assert!(BarDayClock::new(0).is_ok());
    }

    #[test]
    fn test_after_boundary_starts_today() {
        let clock = BarDayClock::default();
        let day = clock.current(at(2026, 1, 16, 22, 30));

        assert_eq!(day.start, at(2026, 1, 16, 3, 0));
        assert_eq!(day.end, at(2026, 1, 17, 3, 0));
    }

    #[test]
    fn test_before_boundary_uses_previous_calendar_day() {
        let clock = BarDayClock::default();
        // 01:30 is still the previous night's session
        let day = clock.current(at(2026, 1, 17, 1, 30));

        assert_eq!(day.start, at(2026, 1, 16, 3, 0));
        assert_eq!(day.end, at(2026, 1, 17, 3, 0));
    }

    #[test]
    fn test_boundary_is_inclusive_on_the_new_day() {
        let clock = BarDayClock::default();

        // 02:59 belongs to the previous bar day
        let before = clock.current(at(2026, 1, 17, 2, 59));
        assert_eq!(before.start, at(2026, 1, 16, 3, 0));

        // 03:00 opens the new bar day
        let after = clock.current(at(2026, 1, 17, 3, 0));
        assert_eq!(after.start, at(2026, 1, 17, 3, 0));
    }

    #[test]
    fn test_contains_half_open_interval() {
        let clock = BarDayClock::default();
        let day = clock.current(at(2026, 1, 16, 12, 0));

        assert!(day.contains(at(2026, 1, 16, 3, 0)));
        assert!(day.contains(at(2026, 1, 17, 2, 59)));
        assert!(!day.contains(at(2026, 1, 17, 3, 0)));
        assert!(!day.contains(at(2026, 1, 16, 2, 59)));
    }

    #[test]
    fn test_previous_day_abuts_current() {
        let clock = BarDayClock::default();
        let day = clock.current(at(2026, 1, 16, 22, 0));
        let prev = day.previous();

        assert_eq!(prev.end, day.start);
        assert_eq!(prev.start, at(2026, 1, 15, 3, 0));
    }

    #[test]
    fn test_time_slot_buckets() {
        // 2026-01-16 is a Friday
        let slot = TimeSlot::containing(at(2026, 1, 16, 22, 15));
        assert_eq!(slot.weekday, Weekday::Fri);
        assert_eq!(slot.block_start_hour, 21);
        assert_eq!(slot.key(), "fri-21");

        let early = TimeSlot::containing(at(2026, 1, 16, 2, 0));
        assert_eq!(early.block_start_hour, 0);
        assert_eq!(early.key(), "fri-00");
    }

    #[test]
    fn test_same_slot_across_weeks() {
        // Two Fridays a week apart land in the same slot
        let a = TimeSlot::containing(at(2026, 1, 16, 21, 0));
        let b = TimeSlot::containing(at(2026, 1, 23, 23, 59));
        assert_eq!(a, b);
    }
}
