//! Spending limit tracker
//!
//! Per-safe rolling daily/monthly usage with lazy, timezone-aware renewal.
//!
//! Nothing is scheduled: each access first materializes the limit that applies
//! at `now`, which means
//! 1. A pending limit update whose effective time has passed becomes current
//! 2. `spent_today` resets once the start of the next local day is reached
//! 3. `spent_this_month` resets once the start of the next local month is reached
//!
//! CRITICAL: All USD values are u128 with 6 decimals

use crate::core::time::{start_of_next_day, start_of_next_month, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted timezone offset (UTC±14:00)
pub const MAX_TIMEZONE_OFFSET: i64 = 14 * 3_600;

/// Errors raised by spending limit operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpendingLimitError {
    #[error("Daily limit {daily} cannot be greater than monthly limit {monthly}")]
    DailyLimitExceedsMonthly { daily: u128, monthly: u128 },

    #[error("Daily available spending limit less than amount requested: requested {requested}, available {available}")]
    DailyLimitExceeded { requested: u128, available: u128 },

    #[error("Monthly available spending limit less than amount requested: requested {requested}, available {available}")]
    MonthlyLimitExceeded { requested: u128, available: u128 },

    #[error("Timezone offset {0} is outside of ±14 hours")]
    InvalidTimezoneOffset(i64),
}

/// A limit change waiting for its effective time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLimitUpdate {
    pub new_daily_limit: u128,
    pub new_monthly_limit: u128,
    pub effective_time: Timestamp,
}

/// Remaining headroom under the currently effective limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingHeadroom {
    pub daily: u128,
    pub monthly: u128,
}

impl SpendingHeadroom {
    /// Largest single spend allowed right now
    pub fn spendable(&self) -> u128 {
        self.daily.min(self.monthly)
    }
}

/// Rolling spending limit of one safe
///
/// # Example
/// ```
/// use safe_cash_core_rs::models::SpendingLimit;
///
/// let now = 1_704_103_200; // 2024-01-01 10:00 UTC
/// let mut limit = SpendingLimit::initialize(1_000_000_000, 5_000_000_000, 0, now).unwrap();
///
/// limit.spend(400_000_000, now).unwrap();
/// assert_eq!(limit.max_can_spend(now).spendable(), 600_000_000);
///
/// // Next local day: the daily counter renews, the monthly one does not
/// let tomorrow = now + 86_400;
/// assert_eq!(limit.max_can_spend(tomorrow).daily, 1_000_000_000);
/// assert_eq!(limit.max_can_spend(tomorrow).monthly, 4_600_000_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingLimit {
    daily_limit: u128,
    monthly_limit: u128,
    spent_today: u128,
    spent_this_month: u128,
    pending_update: Option<PendingLimitUpdate>,
    daily_renewal_timestamp: Timestamp,
    monthly_renewal_timestamp: Timestamp,
    timezone_offset: i64,
}

impl SpendingLimit {
    /// Create a limit with zero usage
    ///
    /// # Errors
    /// - `DailyLimitExceedsMonthly` if `daily_limit > monthly_limit`
    /// - `InvalidTimezoneOffset` if the offset is beyond ±14h
    pub fn initialize(
        daily_limit: u128,
        monthly_limit: u128,
        timezone_offset: i64,
        now: Timestamp,
    ) -> Result<Self, SpendingLimitError> {
        if timezone_offset.abs() > MAX_TIMEZONE_OFFSET {
            return Err(SpendingLimitError::InvalidTimezoneOffset(timezone_offset));
        }
        ensure_daily_within_monthly(daily_limit, monthly_limit)?;

        Ok(Self {
            daily_limit,
            monthly_limit,
            spent_today: 0,
            spent_this_month: 0,
            pending_update: None,
            daily_renewal_timestamp: start_of_next_day(now, timezone_offset),
            monthly_renewal_timestamp: start_of_next_month(now, timezone_offset),
            timezone_offset,
        })
    }

    /// Materialize the limit that applies at `now` without touching `self`
    pub fn current(&self, now: Timestamp) -> Self {
        let mut limit = self.clone();
        limit.renew(now);
        limit
    }

    /// Check whether `amount` fits within both the daily and monthly headroom
    pub fn can_spend(&self, amount: u128, now: Timestamp) -> Result<(), SpendingLimitError> {
        self.current(now).check(amount)
    }

    /// Renew, validate and record `amount` as spent
    pub fn spend(&mut self, amount: u128, now: Timestamp) -> Result<(), SpendingLimitError> {
        self.renew(now);
        self.check(amount)?;
        self.spent_today += amount;
        self.spent_this_month += amount;
        Ok(())
    }

    /// Schedule new limits to take effect at `now + delay`
    ///
    /// A zero delay applies the change immediately. A later update replaces an
    /// earlier pending one.
    pub fn update(
        &mut self,
        new_daily_limit: u128,
        new_monthly_limit: u128,
        delay: u64,
        now: Timestamp,
    ) -> Result<(), SpendingLimitError> {
        ensure_daily_within_monthly(new_daily_limit, new_monthly_limit)?;
        self.renew(now);

        if delay == 0 {
            self.daily_limit = new_daily_limit;
            self.monthly_limit = new_monthly_limit;
            self.pending_update = None;
        } else {
            self.pending_update = Some(PendingLimitUpdate {
                new_daily_limit,
                new_monthly_limit,
                effective_time: now.saturating_add(delay),
            });
        }
        Ok(())
    }

    /// Remaining daily and monthly headroom at `now`
    pub fn max_can_spend(&self, now: Timestamp) -> SpendingHeadroom {
        let current = self.current(now);
        SpendingHeadroom {
            daily: current.daily_limit.saturating_sub(current.spent_today),
            monthly: current.monthly_limit.saturating_sub(current.spent_this_month),
        }
    }

    fn renew(&mut self, now: Timestamp) {
        if let Some(update) = self.pending_update {
            if now >= update.effective_time {
                self.daily_limit = update.new_daily_limit;
                self.monthly_limit = update.new_monthly_limit;
                self.pending_update = None;
            }
        }

        if now >= self.daily_renewal_timestamp {
            self.spent_today = 0;
            self.daily_renewal_timestamp = start_of_next_day(now, self.timezone_offset);
        }

        if now >= self.monthly_renewal_timestamp {
            self.spent_this_month = 0;
            self.monthly_renewal_timestamp = start_of_next_month(now, self.timezone_offset);
        }
    }

    fn check(&self, amount: u128) -> Result<(), SpendingLimitError> {
        let daily_available = self.daily_limit.saturating_sub(self.spent_today);
        if amount > daily_available {
            return Err(SpendingLimitError::DailyLimitExceeded {
                requested: amount,
                available: daily_available,
            });
        }

        let monthly_available = self.monthly_limit.saturating_sub(self.spent_this_month);
        if amount > monthly_available {
            return Err(SpendingLimitError::MonthlyLimitExceeded {
                requested: amount,
                available: monthly_available,
            });
        }

        Ok(())
    }

    pub fn daily_limit(&self) -> u128 {
        self.daily_limit
    }

    pub fn monthly_limit(&self) -> u128 {
        self.monthly_limit
    }

    pub fn spent_today(&self) -> u128 {
        self.spent_today
    }

    pub fn spent_this_month(&self) -> u128 {
        self.spent_this_month
    }

    pub fn pending_update(&self) -> Option<&PendingLimitUpdate> {
        self.pending_update.as_ref()
    }

    pub fn daily_renewal_timestamp(&self) -> Timestamp {
        self.daily_renewal_timestamp
    }

    pub fn monthly_renewal_timestamp(&self) -> Timestamp {
        self.monthly_renewal_timestamp
    }

    pub fn timezone_offset(&self) -> i64 {
        self.timezone_offset
    }
}

fn ensure_daily_within_monthly(daily: u128, monthly: u128) -> Result<(), SpendingLimitError> {
    if daily > monthly {
        return Err(SpendingLimitError::DailyLimitExceedsMonthly { daily, monthly });
    }
    Ok(())
}
