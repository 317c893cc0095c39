//! Cron expression handling.
//!
//! Job schedules are stored as standard 5-field crontab expressions; the
//! cron crate wants a leading seconds field, so parsing normalizes by
//! prepending `0`. 6-field expressions pass through unchanged.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::{Error, Result};

/// Parse a cron expression, accepting the 5-field crontab form
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    let trimmed = expression.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    };

    Schedule::from_str(&normalized).map_err(|e| Error::Schedule {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// Next occurrence strictly after the given instant
pub fn next_after(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hourly_next_run_is_top_of_next_hour() {
        let schedule = parse_schedule("0 * * * *").unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 14, 25, 30).unwrap();
        let next = next_after(&schedule, at).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_is_strictly_after() {
        // Execution exactly at the top of the hour must schedule the NEXT hour
        let schedule = parse_schedule("0 * * * *").unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap();
        let next = next_after(&schedule, at).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_interval_expression() {
        let schedule = parse_schedule("*/15 * * * *").unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 14, 7, 0).unwrap();
        let next = next_after(&schedule, at).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 14, 15, 0).unwrap());
    }

    #[test]
    fn test_six_field_expression_passes_through() {
        let schedule = parse_schedule("30 0 * * * *").unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap();
        let next = next_after(&schedule, at).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 30).unwrap());
    }

    #[test]
    fn test_invalid_expression_rejected() {
        let err = parse_schedule("bad cron");
        assert!(matches!(err, Err(Error::Schedule { .. })));

        let err = parse_schedule("99 * * * *");
        assert!(matches!(err, Err(Error::Schedule { .. })));
    }
}
