//! Time management for the cash engine
//!
//! The host execution environment supplies wall-clock time as unix seconds.
//! Nothing in the engine runs on a timer: delayed changes are resolved lazily
//! by comparing a stored activation timestamp against the `now` handed to each
//! operation.
//!
//! Calendar boundaries (start of the next day / month) are computed in the
//! local calendar of a signed timezone offset, which is how spending limits
//! renew.

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Seconds in one calendar day
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Start of the next local day, expressed as a UTC timestamp
///
/// # Example
/// ```
/// use safe_cash_core_rs::core::start_of_next_day;
///
/// // 2024-01-01 10:00:00 UTC
/// let now = 1_704_103_200;
/// assert_eq!(start_of_next_day(now, 0), 1_704_153_600); // 2024-01-02 00:00 UTC
///
/// // UTC+2: local midnight is 22:00 UTC the day before
/// assert_eq!(start_of_next_day(now, 7_200), 1_704_146_400);
/// ```
pub fn start_of_next_day(now: Timestamp, timezone_offset: i64) -> Timestamp {
    let Some(local) = local_seconds(now, timezone_offset) else {
        return Timestamp::MAX;
    };
    (local.div_euclid(SECONDS_PER_DAY) + 1)
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|midnight| midnight.checked_sub(timezone_offset))
        .map_or(Timestamp::MAX, clamp_timestamp)
}

/// Start of the next local calendar month, expressed as a UTC timestamp
///
/// # Example
/// ```
/// use safe_cash_core_rs::core::start_of_next_month;
///
/// // 2024-01-31 23:00:00 UTC
/// let now = 1_706_742_000;
/// assert_eq!(start_of_next_month(now, 0), 1_706_745_600); // 2024-02-01 00:00 UTC
///
/// // In UTC+2 it is already February, so the next boundary is March 1st local
/// assert_eq!(start_of_next_month(now, 7_200), 1_709_244_000);
/// ```
pub fn start_of_next_month(now: Timestamp, timezone_offset: i64) -> Timestamp {
    let Some(local_date) = local_seconds(now, timezone_offset)
        .and_then(|local| DateTime::from_timestamp(local, 0))
        .map(|dt| dt.date_naive())
    else {
        return Timestamp::MAX;
    };

    let (year, month) = if local_date.month() == 12 {
        (local_date.year() + 1, 1)
    } else {
        (local_date.year(), local_date.month() + 1)
    };

    match NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(first_of_month) => {
            clamp_timestamp(first_of_month.and_utc().timestamp() - timezone_offset)
        }
        None => Timestamp::MAX,
    }
}

/// `now` shifted into local time, or `None` past the representable range
fn local_seconds(now: Timestamp, timezone_offset: i64) -> Option<i64> {
    i64::try_from(now).ok()?.checked_add(timezone_offset)
}

fn clamp_timestamp(value: i64) -> Timestamp {
    value.max(0) as Timestamp
}

/// Manually advanced wall clock
///
/// Hosts that replay transactions drive the engine with this clock instead of
/// the system time so that runs are reproducible.
///
/// # Example
/// ```
/// use safe_cash_core_rs::core::Clock;
///
/// let mut clock = Clock::new(1_000);
/// clock.advance(60);
/// assert_eq!(clock.now(), 1_060);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    now: Timestamp,
}

impl Clock {
    /// Create a clock positioned at `start`
    pub fn new(start: Timestamp) -> Self {
        Self { now: start }
    }

    /// Current time
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Move the clock forward by `seconds`
    pub fn advance(&mut self, seconds: u64) {
        self.now = self.now.saturating_add(seconds);
    }

    /// Jump to an absolute time. Clocks never run backwards, so an earlier
    /// timestamp leaves the clock where it is.
    pub fn set(&mut self, timestamp: Timestamp) {
        self.now = self.now.max(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-15 12:00:00 UTC
    const MID_MARCH: Timestamp = 1_710_504_000;

    #[test]
    fn test_next_day_is_always_in_the_future() {
        for offset in [-43_200, -3_600, 0, 3_600, 50_400] {
            let next = start_of_next_day(MID_MARCH, offset);
            assert!(next > MID_MARCH);
            assert!(next - MID_MARCH <= SECONDS_PER_DAY as u64);
        }
    }

    #[test]
    fn test_exact_midnight_rolls_to_following_day() {
        let midnight = 1_710_460_800; // 2024-03-15 00:00:00 UTC
        assert_eq!(start_of_next_day(midnight, 0), midnight + 86_400);
    }

    #[test]
    fn test_negative_offset_shifts_boundary_later() {
        // UTC-5: local midnight is 05:00 UTC
        assert_eq!(start_of_next_day(MID_MARCH, -18_000), 1_710_565_200);
    }

    #[test]
    fn test_next_month_handles_year_rollover() {
        let december = 1_702_641_600; // 2023-12-15 12:00:00 UTC
        assert_eq!(start_of_next_month(december, 0), 1_704_067_200); // 2024-01-01
    }

    #[test]
    fn test_next_month_leap_february() {
        let february = 1_708_948_800; // 2024-02-26 12:00:00 UTC
        assert_eq!(start_of_next_month(february, 0), 1_709_251_200); // 2024-03-01
    }

    #[test]
    fn test_boundaries_saturate_at_far_future() {
        let near_limit = i64::MAX as Timestamp;
        assert_eq!(start_of_next_day(Timestamp::MAX, 0), Timestamp::MAX);
        assert_eq!(start_of_next_day(near_limit, 3_600), Timestamp::MAX);
        assert_eq!(start_of_next_day(near_limit - 10, 0), Timestamp::MAX);
        assert_eq!(start_of_next_month(Timestamp::MAX, 0), Timestamp::MAX);
        assert_eq!(start_of_next_month(near_limit, -3_600), Timestamp::MAX);
    }

    #[test]
    fn test_clock_ignores_rewind() {
        let mut clock = Clock::new(100);
        clock.set(99);
        assert_eq!(clock.now(), 100);
        clock.set(150);
        assert_eq!(clock.now(), 150);
    }
}
