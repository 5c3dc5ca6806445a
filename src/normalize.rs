//! Record normalization
//!
//! Turns raw prescription batches into the normalized stream shared by both
//! pipelines: text fields coerced to `Utf8` with empty strings as null, issue
//! dates parsed and resolved against the sentinel rules, and every record
//! without a usable issue date or participant dropped.
//!
//! Normalized output is valid input: running the normalizer again changes
//! nothing.

use std::ops::AddAssign;

use arrow::array::{Array, ArrayRef, BooleanArray, Date32Array, StringArray};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::config::ColumnNames;
use crate::demographics::DemographicLookup;
use crate::error::Result;
use crate::filter::core::{BatchFilter, array_ref, filter_columns};
use crate::schema::{self, date_to_days, days_to_date};
use crate::sentinel::{Missing, Resolution, resolve};
use crate::utils::arrow::{date_column, string_column};

/// Why a record was removed during normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Participant identifier is null
    MissingParticipant,
    /// Issue date is null or in neither accepted format
    UnparseableDate,
    /// DOB sentinel for a participant without a unique date of birth
    LookupNotFound,
    /// Issue date is, or resolved to, a missing-information sentinel
    MissingSentinel,
}

impl From<Missing> for DropReason {
    fn from(missing: Missing) -> Self {
        match missing {
            Missing::Unparseable => Self::UnparseableDate,
            Missing::LookupNotFound(_) => Self::LookupNotFound,
            Missing::MissingSentinel => Self::MissingSentinel,
        }
    }
}

/// Counters for one or more normalized batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Kept records whose issue date was replaced by a date of birth
    pub dob_substituted: usize,
    pub missing_participant: usize,
    pub unparseable_date: usize,
    pub lookup_not_found: usize,
    pub missing_sentinel: usize,
}

impl NormalizeStats {
    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::MissingParticipant => self.missing_participant += 1,
            DropReason::UnparseableDate => self.unparseable_date += 1,
            DropReason::LookupNotFound => self.lookup_not_found += 1,
            DropReason::MissingSentinel => self.missing_sentinel += 1,
        }
    }

    #[must_use]
    pub fn dropped(&self) -> usize {
        self.rows_in - self.rows_out
    }
}

impl AddAssign for NormalizeStats {
    fn add_assign(&mut self, other: Self) {
        self.rows_in += other.rows_in;
        self.rows_out += other.rows_out;
        self.dob_substituted += other.dob_substituted;
        self.missing_participant += other.missing_participant;
        self.unparseable_date += other.unparseable_date;
        self.lookup_not_found += other.lookup_not_found;
        self.missing_sentinel += other.missing_sentinel;
    }
}

/// Map empty strings to null
#[must_use]
pub fn nullify_empty(array: &StringArray) -> StringArray {
    array
        .iter()
        .map(|value| value.filter(|s| !s.is_empty()))
        .collect()
}

/// Normalizes raw prescription batches against a demographic lookup
#[derive(Debug, Clone)]
pub struct RecordNormalizer<'a> {
    lookup: &'a DemographicLookup,
    columns: ColumnNames,
}

impl<'a> RecordNormalizer<'a> {
    #[must_use]
    pub fn new(lookup: &'a DemographicLookup, columns: ColumnNames) -> Self {
        Self { lookup, columns }
    }

    /// Normalizer reading the canonical column names of normalized output
    #[must_use]
    pub fn canonical(lookup: &'a DemographicLookup) -> Self {
        Self::new(lookup, ColumnNames::default())
    }

    /// Normalize one raw batch
    ///
    /// Fails only when a required column is missing or has a type that
    /// cannot be read as text or a date.
    pub fn normalize(&self, batch: &RecordBatch) -> Result<(RecordBatch, NormalizeStats)> {
        let c = &self.columns;
        // An empty id names no participant and is dropped like a null one
        let ids = nullify_empty(&string_column(batch, &c.participant_id)?);
        // dmd_code may arrive numeric; string_column casts it like the others
        let text = [&c.read_2, &c.bnf_code, &c.dmd_code, &c.drug_name, &c.quantity]
            .into_iter()
            .map(|name| string_column(batch, name).map(|a| nullify_empty(&a)))
            .collect::<Result<Vec<_>>>()?;
        let raw_dates = date_column(batch, &c.issue_date)?;

        let (dates, keep, stats) = self.resolve_dates(&ids, &raw_dates);

        let mut columns: Vec<ArrayRef> = Vec::with_capacity(7);
        columns.push(array_ref(ids));
        columns.extend(text.into_iter().map(array_ref));
        columns.push(array_ref(dates));

        let normalized = filter_columns(schema::normalized_schema(), &columns, &keep)?;
        Ok((normalized, stats))
    }

    fn resolve_dates(
        &self,
        ids: &StringArray,
        raw_dates: &Date32Array,
    ) -> (Date32Array, BooleanArray, NormalizeStats) {
        let mut stats = NormalizeStats {
            rows_in: ids.len(),
            ..Default::default()
        };
        let mut resolved = Vec::with_capacity(ids.len());

        for row in 0..ids.len() {
            if ids.is_null(row) {
                stats.record_drop(DropReason::MissingParticipant);
                resolved.push(None);
                continue;
            }

            let raw = if raw_dates.is_null(row) {
                None
            } else {
                days_to_date(raw_dates.value(row))
            };

            match resolve(raw, ids.value(row), self.lookup) {
                Resolution::Resolved(date) => {
                    stats.rows_out += 1;
                    if raw != Some(date) {
                        stats.dob_substituted += 1;
                    }
                    resolved.push(Some(date_to_days(date)));
                }
                Resolution::Missing(missing) => {
                    stats.record_drop(missing.into());
                    resolved.push(None);
                }
            }
        }

        let keep: BooleanArray = resolved.iter().map(|d| Some(d.is_some())).collect();
        (Date32Array::from(resolved), keep, stats)
    }
}

impl BatchFilter for RecordNormalizer<'_> {
    type Stats = NormalizeStats;

    fn filter(&self, batch: &RecordBatch) -> Result<(RecordBatch, NormalizeStats)> {
        self.normalize(batch)
    }

    fn output_schema(&self) -> SchemaRef {
        schema::normalized_schema()
    }
}
