//! Measurement timestamp assembly.
//!
//! Device feeds report the measurement time as separate year / month / day /
//! hour / minute / second columns. These are assembled into a single local
//! ISO-8601 string. Year, month and day are mandatory; the time of day
//! defaults to midnight piecewise.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::columns::FieldColumns;
use crate::model::RawDeviceFeed;

/// Canonical measurement datetime format. Never contains a comma.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Coerces a cell to an integer by truncating through a float parse,
/// so `"7"`, `"7.0"` and `" 7.9 "` all yield 7.
pub fn parse_int_lenient(cell: &str) -> Option<i64> {
    let value = cell.trim().parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    if truncated < i64::MIN as f64 || truncated > i64::MAX as f64 {
        return None;
    }
    Some(truncated as i64)
}

/// Builds `YYYY-MM-DDTHH:MM:SS` from the resolved date/time columns of `row`.
///
/// Returns `None` when year, month or day is unresolved, missing or not
/// numeric, or when the pieces do not form a valid calendar date and time.
/// A missing or non-numeric hour, minute or second counts as zero.
pub fn assemble(feed: &RawDeviceFeed, row: &[Option<String>], columns: &FieldColumns) -> Option<String> {
    let required = |column: &Option<String>| -> Option<i64> {
        let name = column.as_deref()?;
        parse_int_lenient(feed.cell(row, name)?)
    };
    let optional = |column: &Option<String>| -> i64 {
        column
            .as_deref()
            .and_then(|name| feed.cell(row, name))
            .and_then(parse_int_lenient)
            .unwrap_or(0)
    };

    let year = required(&columns.measurement_year)?;
    let month = required(&columns.measurement_month)?;
    let day = required(&columns.measurement_day)?;
    let hour = optional(&columns.measurement_hour);
    let minute = optional(&columns.measurement_minute);
    let second = optional(&columns.measurement_second);

    from_parts(year, month, day, hour, minute, second)
}

/// Formats the given parts, or `None` if they are not a real date and time.
pub fn from_parts(year: i64, month: i64, day: i64, hour: i64, minute: i64, second: i64) -> Option<String> {
    // Four-digit years only, so the format stays fixed width.
    if !(1..=9999).contains(&year) {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )?;
    let datetime = date.and_hms_opt(
        u32::try_from(hour).ok()?,
        u32::try_from(minute).ok()?,
        u32::try_from(second).ok()?,
    )?;
    Some(datetime.format(DATETIME_FORMAT).to_string())
}

/// Re-parses a datetime string and returns it in canonical form.
///
/// Accepts `T` or space separators, fractional seconds, a trailing UTC offset
/// (dropped, the wall-clock value is kept) and bare dates. Anything else is
/// `None`.
pub fn normalize_datetime(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    const NAIVE_FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
    ];

    let parsed = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z")
                .ok()
                .map(|dt| dt.naive_local())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    if !(1..=9999).contains(&chrono::Datelike::year(&parsed)) {
        return None;
    }
    Some(parsed.format(DATETIME_FORMAT).to_string())
}
