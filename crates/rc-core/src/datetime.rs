//! Timestamp parsing for conferencing exports.
//!
//! Exports print timestamps as `D/M/Y h:m:s AM|PM` without saying whether the
//! first component is the day or the month. The disambiguation rule is:
//!
//! | first | second | reading                   |
//! |-------|--------|---------------------------|
//! | > 12  | <= 12  | day/month                 |
//! | <= 12 | > 12   | month/day (swapped)       |
//! | <= 12 | <= 12  | day/month (policy choice) |
//!
//! The last row is a guess with no ground truth behind it: an export written
//! month-first with both components <= 12 parses to the wrong date. Callers
//! with month-first data must convert it before handing it over.

use chrono::{Local, NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Reasons a timestamp could not be read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("empty timestamp")]
    Empty,
    #[error("malformed timestamp: {0:?}")]
    Malformed(String),
    #[error("timestamp out of range: {0:?}")]
    OutOfRange(String),
}

/// Parses an export timestamp, falling back to the current local time.
///
/// One bad row should not sink a whole course, so failures are logged and
/// replaced with "now" instead of surfacing as errors.
pub fn parse_export_timestamp(input: &str) -> NaiveDateTime {
    match try_parse_export_timestamp(input) {
        Ok(ts) => ts,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable timestamp, using current time");
            Local::now().naive_local()
        }
    }
}

/// Parses an export timestamp, reporting why it failed.
///
/// Accepts `D/M/Y h:m[:s] [AM|PM]`. Without a meridiem indicator the clock is
/// read as 24-hour.
pub fn try_parse_export_timestamp(input: &str) -> Result<NaiveDateTime, TimestampError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimestampError::Empty);
    }
    let malformed = || TimestampError::Malformed(trimmed.to_string());

    let mut parts = trimmed.split_whitespace();
    let date_part = parts.next().ok_or_else(malformed)?;
    let time_part = parts.next().ok_or_else(malformed)?;
    let meridiem = parts.next().map(parse_meridiem).transpose()?;
    if parts.next().is_some() {
        return Err(malformed());
    }

    let (p1, p2, year) = parse_date_components(date_part).ok_or_else(malformed)?;
    let (day, month) = disambiguate_day_month(p1, p2);
    let (hour, minute, second) = parse_time_components(time_part).ok_or_else(malformed)?;
    let hour = match meridiem {
        Some(m) => to_24_hour(hour, m).ok_or_else(malformed)?,
        None => hour,
    };

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| TimestampError::OutOfRange(trimmed.to_string()))
}

/// Decides which of the first two date components is the day.
///
/// Returns `(day, month)`.
pub const fn disambiguate_day_month(p1: u32, p2: u32) -> (u32, u32) {
    if p2 > 12 && p1 <= 12 { (p2, p1) } else { (p1, p2) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

fn parse_meridiem(s: &str) -> Result<Meridiem, TimestampError> {
    if s.eq_ignore_ascii_case("am") {
        Ok(Meridiem::Am)
    } else if s.eq_ignore_ascii_case("pm") {
        Ok(Meridiem::Pm)
    } else {
        Err(TimestampError::Malformed(s.to_string()))
    }
}

const fn to_24_hour(hour: u32, meridiem: Meridiem) -> Option<u32> {
    if hour > 12 {
        return None;
    }
    Some(match (meridiem, hour) {
        (Meridiem::Am, 12) => 0,
        (Meridiem::Pm, 12) | (Meridiem::Am, _) => hour,
        (Meridiem::Pm, _) => hour + 12,
    })
}

fn parse_date_components(s: &str) -> Option<(u32, u32, i32)> {
    let mut it = s.split('/');
    let p1 = it.next()?.trim().parse().ok()?;
    let p2 = it.next()?.trim().parse().ok()?;
    let year = it.next()?.trim().parse().ok()?;
    if it.next().is_some() {
        return None;
    }
    Some((p1, p2, year))
}

fn parse_time_components(s: &str) -> Option<(u32, u32, u32)> {
    let mut it = s.split(':');
    let hour = it.next()?.trim().parse().ok()?;
    let minute = it.next()?.trim().parse().ok()?;
    let second = match it.next() {
        Some(sec) => sec.trim().parse().ok()?,
        None => 0,
    };
    if it.next().is_some() {
        return None;
    }
    Some((hour, minute, second))
}
