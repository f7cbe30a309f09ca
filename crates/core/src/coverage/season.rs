//! Current-season policy.
//!
//! Seasons are labelled by the calendar year in which they end, so the
//! 2024-25 season is `2025`. Which season is "current" depends on a
//! configured boundary month; near the boundary, and in lockout or
//! shortened years, this is a policy choice rather than a derived fact.

use chrono::{DateTime, Datelike, Utc};

/// Month-based season boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonPolicy {
    /// First month (1-12) of a new season.
    pub start_month: u32,
}

impl SeasonPolicy {
    pub fn new(start_month: u32) -> Self {
        Self {
            start_month: start_month.clamp(1, 12),
        }
    }

    /// Season label in progress at `now`.
    pub fn current_season(&self, now: DateTime<Utc>) -> i32 {
        if now.month() >= self.start_month {
            now.year() + 1
        } else {
            now.year()
        }
    }

    pub fn is_current(&self, season: i32, now: DateTime<Utc>) -> bool {
        season == self.current_season(now)
    }
}

impl Default for SeasonPolicy {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_before_boundary() {
        let policy = SeasonPolicy::default();
        assert_eq!(policy.current_season(at(2025, 3, 15)), 2025);
        assert_eq!(policy.current_season(at(2025, 9, 30)), 2025);
    }

    #[test]
    fn test_on_and_after_boundary() {
        let policy = SeasonPolicy::default();
        assert_eq!(policy.current_season(at(2025, 10, 1)), 2026);
        assert_eq!(policy.current_season(at(2025, 12, 25)), 2026);
    }

    #[test]
    fn test_custom_boundary() {
        let policy = SeasonPolicy::new(12);
        assert_eq!(policy.current_season(at(2020, 11, 30)), 2020);
        assert_eq!(policy.current_season(at(2020, 12, 22)), 2021);
        assert!(policy.is_current(2021, at(2021, 1, 5)));
    }

    #[test]
    fn test_month_clamped() {
        assert_eq!(SeasonPolicy::new(0).start_month, 1);
        assert_eq!(SeasonPolicy::new(13).start_month, 12);
    }
}
