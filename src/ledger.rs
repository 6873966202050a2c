//! Daily call accounting.

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Calls made today against the daily limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub calls_today: u32,
    pub daily_limit: u32,
}

impl Usage {
    /// Share of the daily limit used, in percent. Capped at 100.
    pub fn percentage(&self) -> f64 {
        if self.daily_limit == 0 {
            return 100.0;
        }
        (f64::from(self.calls_today) * 100.0 / f64::from(self.daily_limit)).min(100.0)
    }

    pub fn remaining(&self) -> u32 {
        self.daily_limit.saturating_sub(self.calls_today)
    }
}

/// A call counted ahead of the request it belongs to.
///
/// Handing it back through [`UsageLedger::release`] undoes the count, as
/// long as the day has not rolled over in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Reservation {
    date: NaiveDate,
}

/// In-memory counter of the calls made today.
///
/// The counter resets lazily: every access compares the stored date with the
/// supplied `today` and zeroes the count first when they differ.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use govee_lights_rs::UsageLedger;
///
/// let day = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
/// let mut ledger = UsageLedger::new(10_000, day);
/// ledger.record_call(day);
/// ledger.record_call(day);
/// assert_eq!(ledger.current_usage(day).calls_today, 2);
///
/// let next = day.succ_opt().unwrap();
/// assert_eq!(ledger.current_usage(next).calls_today, 0);
/// ```
#[derive(Debug, Clone)]
pub struct UsageLedger {
    calls_today: u32,
    daily_limit: u32,
    last_reset_date: NaiveDate,
    last_call_at: Option<DateTime<Utc>>,
}

impl UsageLedger {
    pub fn new(daily_limit: u32, today: NaiveDate) -> Self {
        Self {
            calls_today: 0,
            daily_limit,
            last_reset_date: today,
            last_call_at: None,
        }
    }

    /// Count one call made today.
    pub fn record_call(&mut self, today: NaiveDate) {
        self.roll_over(today);
        self.calls_today = self.calls_today.saturating_add(1);
        debug!("request count: {}/{}", self.calls_today, self.daily_limit);
    }

    /// Count one call before it is sent.
    pub fn reserve(&mut self, today: NaiveDate) -> Reservation {
        self.record_call(today);
        Reservation { date: today }
    }

    /// Undo a reservation whose call never counted.
    ///
    /// A reservation from a previous day is dropped: that day's count is
    /// already gone.
    pub fn release(&mut self, reservation: Reservation, today: NaiveDate) {
        self.roll_over(today);
        if reservation.date == self.last_reset_date {
            self.calls_today = self.calls_today.saturating_sub(1);
        }
    }

    /// Returns `(calls_today, daily_limit)` as of `today`.
    pub fn current_usage(&mut self, today: NaiveDate) -> Usage {
        self.roll_over(today);
        Usage {
            calls_today: self.calls_today,
            daily_limit: self.daily_limit,
        }
    }

    pub fn mark_call_time(&mut self, at: DateTime<Utc>) {
        self.last_call_at = Some(at);
    }

    pub fn last_call_at(&self) -> Option<DateTime<Utc>> {
        self.last_call_at
    }

    pub fn last_reset_date(&self) -> NaiveDate {
        self.last_reset_date
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    fn roll_over(&mut self, today: NaiveDate) {
        if self.last_reset_date != today {
            info!(
                "resetting request count for {} ({} calls on {})",
                today, self.calls_today, self.last_reset_date
            );
            self.calls_today = 0;
            self.last_reset_date = today;
        }
    }
}
