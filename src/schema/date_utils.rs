//! Module for handling date parsing and Date32 conversion.

use chrono::{Datelike, NaiveDate};

/// Days between 0001-01-01 (CE day 1) and the Unix epoch
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

/// Formats accepted for textual issue dates: ISO first, then day-first
pub const ISSUE_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d-%m-%Y"];

/// Parse an issue date written as `YYYY-MM-DD` or `DD-MM-YYYY`
///
/// Surrounding whitespace is ignored. Anything else, including an empty
/// string or an impossible calendar date, yields `None`.
#[must_use]
pub fn parse_issue_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() != 10 {
        return None;
    }

    let format = detect_date_format(s)?;
    NaiveDate::parse_from_str(s, format).ok()
}

/// Pick the format from the position of the dashes
fn detect_date_format(s: &str) -> Option<&'static str> {
    let bytes = s.as_bytes();
    match (bytes.get(4), bytes.get(2), bytes.get(5)) {
        (Some(b'-'), _, _) if bytes.get(7) == Some(&b'-') => Some(ISSUE_DATE_FORMATS[0]),
        (_, Some(b'-'), Some(b'-')) => Some(ISSUE_DATE_FORMATS[1]),
        _ => None,
    }
}

/// Convert a date to Arrow `Date32` days since the Unix epoch
#[must_use]
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

/// Convert Arrow `Date32` days since the Unix epoch to a date
#[must_use]
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_FROM_CE)?)
}
