//! Time arithmetic shared by the auto-scheduler.
//!
//! All day bucketing goes through [`local_date_of`]: an instant is converted
//! into the configured zone once and its local year/month/day becomes the
//! `NaiveDate` key. Minute values are minutes from local midnight.

use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Timelike, Utc,
};
use chrono_tz::Tz;
use serde_json::json;

use crate::error::{AppError, AppResult};

pub const SNAP_MINUTES: i64 = 15;
pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Half-open range of minutes `[start, end)` within one local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Removes `[busy_start, busy_end)` from a list of non-overlapping intervals.
///
/// Intervals straddling the busy range are split into at most two pieces and
/// fully covered intervals disappear. Pieces are only produced with a
/// positive length.
pub fn subtract_interval(intervals: &[Interval], busy_start: i64, busy_end: i64) -> Vec<Interval> {
    if busy_end <= busy_start {
        return intervals.to_vec();
    }

    let mut result = Vec::with_capacity(intervals.len() + 1);
    for interval in intervals {
        if busy_end <= interval.start || busy_start >= interval.end {
            result.push(*interval);
            continue;
        }
        if interval.start < busy_start {
            result.push(Interval::new(interval.start, busy_start));
        }
        if interval.end > busy_end {
            result.push(Interval::new(busy_end, interval.end));
        }
    }
    result
}

pub fn snap_up(minutes: i64) -> i64 {
    (minutes + SNAP_MINUTES - 1).div_euclid(SNAP_MINUTES) * SNAP_MINUTES
}

pub fn snap_down(minutes: i64) -> i64 {
    minutes.div_euclid(SNAP_MINUTES) * SNAP_MINUTES
}

pub fn is_on_grid(minutes: i64) -> bool {
    minutes.rem_euclid(SNAP_MINUTES) == 0
}

pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    name.trim().parse::<Tz>().map_err(|err| {
        AppError::validation_with_details(
            "unknown time zone",
            json!({"value": name, "error": err.to_string()}),
        )
    })
}

/// Canonical instant → local calendar date conversion.
pub fn local_date_of(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

pub fn local_datetime_of(instant: DateTime<Utc>, tz: &Tz) -> NaiveDateTime {
    instant.with_timezone(tz).naive_local()
}

pub fn minutes_of_day(local: NaiveDateTime) -> i64 {
    (local.hour() as i64) * 60 + (local.minute() as i64)
}

/// Minute of day rounded up so that any elapsed seconds count as a started minute.
pub fn minutes_of_day_ceil(local: NaiveDateTime) -> i64 {
    let partial = local.second() > 0 || local.nanosecond() > 0;
    minutes_of_day(local) + i64::from(partial)
}

pub fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}

/// 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Local dates in `[start, end)`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut cursor = Some(start);
    while let Some(day) = cursor {
        if day >= end {
            break;
        }
        days.push(day);
        cursor = day.succ_opt();
    }
    days
}

pub fn parse_datetime(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            AppError::validation_with_details(
                "invalid timestamp",
                json!({"value": value, "error": err.to_string()}),
            )
        })
}

pub fn parse_optional_datetime(value: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    value.map(parse_datetime).transpose()
}

/// UTC, second precision, `Z` suffix. Stored instants use this form so that
/// SQLite can range-compare them as text.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|err| {
        AppError::validation_with_details(
            "invalid date, expected YYYY-MM-DD",
            json!({"value": value, "error": err.to_string()}),
        )
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses "HH:MM" into minutes from midnight. "24:00" is accepted as end of day.
pub fn parse_hhmm(value: &str) -> AppResult<i64> {
    let invalid = || {
        AppError::validation_with_details("invalid time, expected HH:MM", json!({"value": value}))
    };

    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hours: i64 = hours.parse().map_err(|_| invalid())?;
    let minutes: i64 = minutes.parse().map_err(|_| invalid())?;
    if !(0..60).contains(&minutes) || hours < 0 {
        return Err(invalid());
    }

    let total = hours * 60 + minutes;
    if total > MINUTES_PER_DAY {
        return Err(invalid());
    }
    Ok(total)
}

pub fn format_hhmm(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
