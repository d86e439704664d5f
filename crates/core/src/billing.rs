//! Monthly billing usage counters.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Messages sent and received by a user within one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingUsage {
    pub user_id: UserId,
    pub sent_messages: u64,
    pub received_messages: u64,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
}

impl BillingUsage {
    /// Empty usage record for the month containing `at`.
    pub fn for_month(user_id: UserId, at: DateTime<Utc>) -> Self {
        let (start, end) = month_bounds(at);
        Self {
            user_id,
            sent_messages: 0,
            received_messages: 0,
            start_timestamp: start,
            end_timestamp: end,
        }
    }

    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.start_timestamp <= at && at <= self.end_timestamp
    }
}

/// First and last instant of the calendar month containing `at`.
pub fn month_bounds(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at);
    let (next_year, next_month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    let next = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(at);
    (start, next - Duration::nanoseconds(1))
}
