//! Date formatting for the `{date(...)}` directive.
//!
//! Formats use single-letter codes (`Y-m-d H:i:s`); a backslash emits the
//! next character literally. Unknown letters pass through unchanged.

use std::fmt::Write;

use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, Timelike, Utc,
};
use forge_core::error::{ForgeError, ForgeResult};

use crate::context::Value;

/// Resolves the time argument of `{date(format, time)}`.
///
/// `null` and `"now"` mean the current local time. Integers (and numeric
/// strings) are unix timestamps in UTC. Other strings are parsed as RFC 3339,
/// `YYYY-MM-DD HH:MM:SS`, or `YYYY-MM-DD`, the last two taken as UTC.
///
/// # Errors
///
/// Returns `CallableError` when the value cannot be read as a time.
pub fn resolve_time(value: &Value) -> ForgeResult<DateTime<FixedOffset>> {
    match value {
        Value::Null => Ok(Local::now().fixed_offset()),
        Value::Integer(ts) => from_timestamp(*ts),
        #[allow(clippy::cast_possible_truncation)]
        Value::Float(ts) => from_timestamp(ts.trunc() as i64),
        Value::String(s) => parse_time(s.trim()),
        other => Err(ForgeError::callable(
            "date",
            format!("cannot use a {} as a time", other.type_name()),
        )),
    }
}

fn from_timestamp(ts: i64) -> ForgeResult<DateTime<FixedOffset>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| ForgeError::callable("date", format!("timestamp {ts} is out of range")))
}

fn parse_time(s: &str) -> ForgeResult<DateTime<FixedOffset>> {
    if s.is_empty() || s.eq_ignore_ascii_case("now") {
        return Ok(Local::now().fixed_offset());
    }
    if let Ok(ts) = s.parse::<i64>() {
        return from_timestamp(ts);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc().fixed_offset());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(ForgeError::callable("date", format!("cannot parse '{s}' as a time")))
}

/// Formats a date/time using single-letter format codes.
///
/// | Code | Output |
/// |---|---|
/// | `d` `j` | day of month, padded / unpadded |
/// | `D` `l` | weekday, short / full name |
/// | `N` `w` | ISO weekday 1-7 / weekday 0-6 from Sunday |
/// | `z` | day of year from 0 |
/// | `W` | ISO week number |
/// | `F` `M` | month, full / short name |
/// | `m` `n` | month number, padded / unpadded |
/// | `t` `L` | days in month / `1` for leap years |
/// | `Y` `y` | year, four / two digits |
/// | `a` `A` | `am`/`pm`, `AM`/`PM` |
/// | `g` `G` `h` `H` | 12h unpadded, 24h unpadded, 12h padded, 24h padded |
/// | `i` `s` | minutes, seconds |
/// | `u` `v` | microseconds, milliseconds |
/// | `e` `T` | timezone (`UTC` or offset) |
/// | `P` `O` | offset as `+02:00` / `+0200` |
/// | `c` `r` `U` | ISO 8601, RFC 2822, unix timestamp |
#[allow(clippy::format_push_string)]
pub fn format_date(dt: &DateTime<FixedOffset>, format: &str) -> String {
    let mut result = String::new();
    let mut chars = format.chars();

    while let Some(ch) = chars.next() {
        match ch {
            'd' => result.push_str(&dt.format("%d").to_string()),
            'D' => result.push_str(&dt.format("%a").to_string()),
            'j' => result.push_str(&dt.day().to_string()),
            'l' => result.push_str(&dt.format("%A").to_string()),
            'N' => result.push_str(&dt.weekday().number_from_monday().to_string()),
            'w' => result.push_str(&dt.weekday().num_days_from_sunday().to_string()),
            'z' => result.push_str(&dt.ordinal0().to_string()),
            'W' => {
                let _ = write!(result, "{:02}", dt.iso_week().week());
            }
            'F' => result.push_str(&dt.format("%B").to_string()),
            'm' => result.push_str(&dt.format("%m").to_string()),
            'M' => result.push_str(&dt.format("%b").to_string()),
            'n' => result.push_str(&dt.month().to_string()),
            't' => result.push_str(&days_in_month(dt.year(), dt.month()).to_string()),
            'L' => result.push(if is_leap_year(dt.year()) { '1' } else { '0' }),
            'Y' => result.push_str(&dt.format("%Y").to_string()),
            'y' => result.push_str(&dt.format("%y").to_string()),
            'a' => result.push_str(&dt.format("%P").to_string()),
            'A' => result.push_str(&dt.format("%p").to_string()),
            'g' => result.push_str(&dt.hour12().1.to_string()),
            'G' => result.push_str(&dt.hour().to_string()),
            'h' => result.push_str(&dt.format("%I").to_string()),
            'H' => result.push_str(&dt.format("%H").to_string()),
            'i' => result.push_str(&dt.format("%M").to_string()),
            's' => result.push_str(&dt.format("%S").to_string()),
            'u' => {
                let _ = write!(result, "{:06}", dt.timestamp_subsec_micros().min(999_999));
            }
            'v' => {
                let _ = write!(result, "{:03}", dt.timestamp_subsec_millis().min(999));
            }
            'e' | 'T' => {
                if dt.offset().local_minus_utc() == 0 {
                    result.push_str("UTC");
                } else {
                    result.push_str(&dt.format("%:z").to_string());
                }
            }
            'P' => result.push_str(&dt.format("%:z").to_string()),
            'O' => result.push_str(&dt.format("%z").to_string()),
            'c' => result.push_str(&dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string()),
            'r' => result.push_str(&dt.format("%a, %d %b %Y %H:%M:%S %z").to_string()),
            'U' => result.push_str(&dt.timestamp().to_string()),
            '\\' => {
                if let Some(next) = chars.next() {
                    result.push(next);
                }
            }
            _ => result.push(ch),
        }
    }

    result
}

const fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

const fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}
