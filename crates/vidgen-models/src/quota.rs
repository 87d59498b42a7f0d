//! Per-user usage quota for quiz jobs.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Counter of quiz jobs a user may still start before `reset_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageQuota {
    pub user_id: String,
    pub remaining: u32,
    pub monthly_limit: u32,
    pub reset_date: DateTime<Utc>,
}

impl UsageQuota {
    /// Fresh quota for a user who has no document yet.
    pub fn new(user_id: impl Into<String>, monthly_limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            remaining: monthly_limit,
            monthly_limit,
            reset_date: first_of_next_month(now),
        }
    }

    /// Apply a pending reset: at or after `reset_date` the counter refills
    /// and the reset date moves to the first of the following month.
    pub fn refreshed(mut self, now: DateTime<Utc>) -> Self {
        if now >= self.reset_date {
            self.remaining = self.monthly_limit;
            self.reset_date = first_of_next_month(now);
        }
        self
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining > 0
    }

    /// The quota after consuming one job, or `None` when exhausted.
    pub fn decremented(&self) -> Option<Self> {
        self.remaining.checked_sub(1).map(|remaining| Self {
            remaining,
            ..self.clone()
        })
    }
}

fn first_of_next_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_else(|| now.date_naive());
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}
