//! Conversion between stored epoch milliseconds and `DateTime<Utc>`.

use chrono::{DateTime, Utc};

use crate::error::SupportError;

pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(millis: i64) -> Result<DateTime<Utc>, SupportError> {
    DateTime::from_timestamp_millis(millis).ok_or(SupportError::Time(millis))
}

/// Current time truncated to millisecond precision, matching what the store keeps.
pub fn now() -> DateTime<Utc> {
    let millis = Utc::now().timestamp_millis();
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}
