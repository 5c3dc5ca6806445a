//! Sentinel issue dates
//!
//! The source extract encodes two kinds of missing information as fixed
//! calendar dates. Dates in [`DOB_DATES`] mean "same as the participant's date
//! of birth" and are substituted; dates in [`MISSING_DATES`] carry no
//! information and the record is dropped. Substitution runs first and the
//! missing check runs on its result, so a date of birth that is itself a
//! missing sentinel drops the record.

use chrono::NaiveDate;

use crate::demographics::{DemographicLookup, LookupNotFound};

const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        None => panic!("invalid sentinel date"),
    }
}

/// Dates meaning "no usable issue date"
pub const MISSING_DATES: [NaiveDate; 3] = [ymd(1900, 1, 1), ymd(1901, 1, 1), ymd(2037, 7, 7)];

/// Dates meaning "issued on the participant's date of birth"
pub const DOB_DATES: [NaiveDate; 2] = [ymd(1902, 2, 2), ymd(1903, 3, 3)];

/// Why a record's issue date could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// Issue date null or not in a recognised format
    Unparseable,
    /// DOB sentinel for a participant without a unique date of birth
    LookupNotFound(LookupNotFound),
    /// Resolved date is a missing-information sentinel
    MissingSentinel,
}

/// Outcome of resolving one issue date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(NaiveDate),
    Missing(Missing),
}

#[must_use]
pub fn is_dob_sentinel(date: NaiveDate) -> bool {
    DOB_DATES.contains(&date)
}

#[must_use]
pub fn is_missing_sentinel(date: NaiveDate) -> bool {
    MISSING_DATES.contains(&date)
}

/// Replace a DOB sentinel with the participant's date of birth
///
/// Every other date, including a missing sentinel, is returned unchanged.
pub fn substitute_dob_sentinel(
    raw: NaiveDate,
    participant_id: &str,
    lookup: &DemographicLookup,
) -> Result<NaiveDate, LookupNotFound> {
    if is_dob_sentinel(raw) {
        lookup.date_of_birth(participant_id)
    } else {
        Ok(raw)
    }
}

/// DOB substitution without the missing-sentinel check
///
/// `None` when the input is missing or the lookup fails.
pub fn resolve_dob_only(
    raw: Option<NaiveDate>,
    participant_id: &str,
    lookup: &DemographicLookup,
) -> Option<NaiveDate> {
    raw.and_then(|date| substitute_dob_sentinel(date, participant_id, lookup).ok())
}

/// Resolve a parsed issue date for one participant
pub fn resolve(
    raw: Option<NaiveDate>,
    participant_id: &str,
    lookup: &DemographicLookup,
) -> Resolution {
    let Some(raw) = raw else {
        return Resolution::Missing(Missing::Unparseable);
    };

    match substitute_dob_sentinel(raw, participant_id, lookup) {
        Err(reason) => Resolution::Missing(Missing::LookupNotFound(reason)),
        Ok(date) if is_missing_sentinel(date) => Resolution::Missing(Missing::MissingSentinel),
        Ok(date) => Resolution::Resolved(date),
    }
}
