//! Timestamps in the table's fixed `YYYY-MM-DD HH:MM:SS` format.
//!
//! The format sorts lexicographically in chronological order, which the
//! query engine relies on.

use std::sync::Mutex;

use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

/// Source of "now" for record timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> PrimitiveDateTime;
}

/// Wall clock, UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        let now = OffsetDateTime::now_utc();
        PrimitiveDateTime::new(now.date(), now.time())
    }
}

/// A clock that starts at a fixed instant and advances by `step` on every
/// read.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<PrimitiveDateTime>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(start: PrimitiveDateTime, step: Duration) -> Self {
        SteppingClock {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> PrimitiveDateTime {
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        let current = *next;
        *next = current.saturating_add(self.step);
        current
    }
}

// Formatting a `PrimitiveDateTime` against a date/time-only description
// cannot fail, so the error arm is unreachable.
pub fn format_timestamp(at: PrimitiveDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default()
}

/// Compact stamp for generated file names: `YYYYmmdd_HHMMSS`.
pub fn file_stamp(at: PrimitiveDateTime) -> String {
    at.format(format_description!("[year][month][day]_[hour][minute][second]"))
        .unwrap_or_default()
}

pub fn parse_timestamp(raw: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(
        raw.trim(),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .ok()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn format_and_parse_agree() {
        let at = datetime!(2024-08-04 09:05:03);
        let text = format_timestamp(at);
        assert_eq!(text, "2024-08-04 09:05:03");
        assert_eq!(parse_timestamp(&text), Some(at));
    }

    #[test]
    fn file_stamp_is_compact() {
        assert_eq!(file_stamp(datetime!(2024-08-04 19:05:03)), "20240804_190503");
    }

    #[test]
    fn early_years_are_zero_padded() {
        let at = datetime!(0999-01-02 03:04:05);
        assert_eq!(format_timestamp(at), "0999-01-02 03:04:05");
        assert_eq!(file_stamp(at), "09990102_030405");
        assert_eq!(parse_timestamp(&format_timestamp(at)), Some(at));
    }

    #[test]
    fn parse_rejects_other_formats() {
        assert_eq!(parse_timestamp("2024-08-04T09:05:03Z"), None);
        assert_eq!(parse_date("04/08/2024"), None);
        assert!(parse_date("2024-08-04").is_some());
    }

    #[test]
    fn stepping_clock_advances() {
        let clock = SteppingClock::new(datetime!(2024-01-01 00:00:00), Duration::seconds(90));
        assert_eq!(format_timestamp(clock.now()), "2024-01-01 00:00:00");
        assert_eq!(format_timestamp(clock.now()), "2024-01-01 00:01:30");
    }
}
