//! Participant date-of-birth lookup
//!
//! Built once per run from the demographic extract and shared read-only
//! between worker threads.

use std::fmt;

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::config::ColumnNames;
use crate::error::Result;
use crate::schema::days_to_date;
use crate::utils::arrow::{date_column, string_column};

/// Why a participant's date of birth could not be determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupNotFound {
    /// No demographic row for the participant
    Absent,
    /// More than one demographic row for the participant
    Ambiguous,
    /// A single row whose date of birth is null or unparseable
    NoDate,
}

impl fmt::Display for LookupNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("no demographic record"),
            Self::Ambiguous => f.write_str("multiple demographic records"),
            Self::NoDate => f.write_str("demographic record without date of birth"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Unique(Option<NaiveDate>),
    Duplicated,
}

/// Read-only map from participant identifier to date of birth
#[derive(Debug, Default, Clone)]
pub struct DemographicLookup {
    entries: FxHashMap<String, Entry>,
}

impl DemographicLookup {
    /// Build the lookup from demographic record batches
    ///
    /// Participant ids may be text or integers; dates of birth may be `Date32`
    /// or text in ISO or day-first form. Rows with a null or empty participant
    /// id are skipped. A participant appearing more than once is kept as
    /// ambiguous and never resolves.
    pub fn from_batches<'a, I>(batches: I, columns: &ColumnNames) -> Result<Self>
    where
        I: IntoIterator<Item = &'a RecordBatch>,
    {
        let mut lookup = Self::default();

        for batch in batches {
            let ids = string_column(batch, &columns.participant_id)?;
            let dobs = date_column(batch, &columns.date_of_birth)?;

            for row in 0..batch.num_rows() {
                if ids.is_null(row) || ids.value(row).is_empty() {
                    continue;
                }
                let dob = if dobs.is_null(row) {
                    None
                } else {
                    days_to_date(dobs.value(row))
                };
                lookup.insert(ids.value(row), dob);
            }
        }

        let ambiguous = lookup.ambiguous_count();
        if ambiguous > 0 {
            log::warn!(
                "{ambiguous} participants have more than one demographic record; their sentinel dates cannot be resolved"
            );
        }
        log::info!("Loaded dates of birth for {} participants", lookup.len());

        Ok(lookup)
    }

    /// Build a lookup from in-memory pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<NaiveDate>)>,
        S: AsRef<str>,
    {
        let mut lookup = Self::default();
        for (id, dob) in pairs {
            lookup.insert(id.as_ref(), dob);
        }
        lookup
    }

    fn insert(&mut self, participant_id: &str, dob: Option<NaiveDate>) {
        self.entries
            .entry(participant_id.to_string())
            .and_modify(|entry| *entry = Entry::Duplicated)
            .or_insert(Entry::Unique(dob));
    }

    /// Date of birth for a participant with exactly one demographic record
    pub fn date_of_birth(&self, participant_id: &str) -> std::result::Result<NaiveDate, LookupNotFound> {
        match self.entries.get(participant_id) {
            None => Err(LookupNotFound::Absent),
            Some(Entry::Duplicated) => Err(LookupNotFound::Ambiguous),
            Some(Entry::Unique(None)) => Err(LookupNotFound::NoDate),
            Some(Entry::Unique(Some(dob))) => Ok(*dob),
        }
    }

    /// Number of distinct participant identifiers seen
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn ambiguous_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| matches!(entry, Entry::Duplicated))
            .count()
    }
}
