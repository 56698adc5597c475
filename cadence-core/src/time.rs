//! Time utilities: wall-clock parsing, intervals and slot alignment.
//!
//! All times are naive local wall-clock values. Timezone handling is the
//! caller's concern.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Calendar years the engine accepts; keeps date arithmetic far from chrono's limits.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

pub fn is_supported(date: NaiveDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

/// Parse a calendar date like "2025-03-01".
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    let date = NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| format!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))?;
    if !is_supported(date) {
        return Err(format!("date '{s}' is outside years {MIN_YEAR}..={MAX_YEAR}"));
    }
    Ok(date)
}

/// Parse a 24-hour time of day like "09:00".
pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
        .map_err(|e| format!("invalid time '{s}' (expected HH:MM): {e}"))
}

/// Parse a weekday tag ("mon", "Tuesday", ...).
pub fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| format!("invalid weekday '{s}' (expected mon..sun)"))
}

/// Parse a local timestamp such as "2025-03-01T08:30" or "2025-03-01 08:30:00".
pub fn parse_local_datetime(s: &str) -> Result<NaiveDateTime, String> {
    let s = s.trim();
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            if !is_supported(dt.date()) {
                return Err(format!("'{s}' is outside years {MIN_YEAR}..={MAX_YEAR}"));
            }
            return Ok(dt);
        }
    }
    parse_date(s)
        .map(start_of_day)
        .map_err(|_| format!("invalid local datetime '{s}' (expected YYYY-MM-DDTHH:MM)"))
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Midnight following `date`, i.e. the exclusive end of that day.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    start_of_day(date) + Duration::days(1)
}

/// Round `dt` up to the next multiple of `slot_minutes` counted from midnight.
pub fn align_up(dt: NaiveDateTime, slot_minutes: u32) -> NaiveDateTime {
    let slot_secs = i64::from(slot_minutes.max(1)) * 60;
    let secs = i64::from(dt.time().num_seconds_from_midnight());
    if secs % slot_secs == 0 && dt.time().nanosecond() == 0 {
        return dt;
    }
    start_of_day(dt.date()) + Duration::seconds((secs / slot_secs + 1) * slot_secs)
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn with_minutes(start: NaiveDateTime, minutes: i64) -> Self {
        Self::new(start, start + Duration::minutes(minutes))
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        parse_local_datetime(s).unwrap()
    }

    #[test]
    fn test_parse_date_and_time() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(parse_date("2025-03-01").unwrap(), date);
        assert_eq!(parse_time("09:05").unwrap(), NaiveTime::from_hms_opt(9, 5, 0).unwrap());
        assert!(parse_date("2025-02-30").is_err());
        assert!(parse_date("03/01/2025").is_err());
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("9am").is_err());
    }

    #[test]
    fn test_dates_outside_supported_years_are_rejected() {
        assert!(parse_date("9999-12-31").is_ok());
        assert!(parse_date("0000-06-01").unwrap_err().contains("outside years"));
        assert!(parse_date("+10000-01-01").is_err());
        assert!(parse_local_datetime("0000-06-01T09:00").is_err());
    }

    #[test]
    fn test_parse_weekday_tags() {
        assert_eq!(parse_weekday("mon").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday("Wednesday").unwrap(), Weekday::Wed);
        assert_eq!(parse_weekday("SUN").unwrap(), Weekday::Sun);
        assert!(parse_weekday("funday").is_err());
    }

    #[test]
    fn test_parse_local_datetime_variants() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(dt("2025-03-01T08:30"), expected);
        assert_eq!(dt("2025-03-01 08:30:00"), expected);
        assert_eq!(dt("2025-03-01").time(), NaiveTime::MIN);
        assert!(parse_local_datetime("tomorrow").is_err());
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(dt("2025-03-01T08:30"), 15), dt("2025-03-01T08:30"));
        assert_eq!(align_up(dt("2025-03-01T08:31"), 15), dt("2025-03-01T08:45"));
        assert_eq!(align_up(dt("2025-03-01T08:30:10"), 5), dt("2025-03-01T08:35"));
        assert_eq!(align_up(dt("2025-03-01T23:50"), 15), dt("2025-03-02T00:00"));
    }

    #[test]
    fn test_interval_overlap_is_half_open() {
        let a = Interval::with_minutes(dt("2025-03-01T09:00"), 60);
        let b = Interval::with_minutes(dt("2025-03-01T10:00"), 30);
        let c = Interval::with_minutes(dt("2025-03-01T09:59"), 30);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert_eq!(a.minutes(), 60);
        assert_eq!(end_of_day(dt("2025-03-01T09:00").date()), dt("2025-03-02T00:00"));
    }
}
