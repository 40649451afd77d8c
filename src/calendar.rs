//! Pure ISO-week arithmetic for season windows.
//!
//! All season boundaries are anchored to the Monday of an ISO-8601 week.
//! No I/O; callers pass explicit instants.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

use crate::error::{LedgerError, Result};

/// ISO (year, week) pair for an instant.
pub fn iso_week(now: DateTime<Utc>) -> (i32, u32) {
    let iso = now.iso_week();
    (iso.year(), iso.week())
}

/// Monday of the given ISO week.
pub fn week_start(year: i32, week: u32) -> Result<NaiveDate> {
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
        .ok_or(LedgerError::InvalidWeek { year, week })
}

/// Full 7-day periods between the Mondays of two ISO weeks. Misordered
/// inputs clamp to 0 rather than erroring.
pub fn weeks_between(
    start_year: i32,
    start_week: u32,
    end_year: i32,
    end_week: u32,
) -> Result<i64> {
    let start = week_start(start_year, start_week)?;
    let end = week_start(end_year, end_week)?;
    Ok(((end - start).num_days() / 7).max(0))
}

/// Last ISO week of a season: start-Monday + (length − 1) weeks, re-derived
/// as an ISO (year, week) pair. Handles 53-week years and year rollover.
pub fn season_end(start_year: i32, start_week: u32, length_weeks: u32) -> Result<(i32, u32)> {
    let start = week_start(start_year, start_week)?;
    let end = start + Duration::weeks(i64::from(length_weeks) - 1);
    let iso = end.iso_week();
    Ok((iso.year(), iso.week()))
}

/// `YYYY-W##` label with a zero-padded week number.
pub fn week_label(year: i32, week: u32) -> String {
    format!("{year}-W{week:02}")
}
