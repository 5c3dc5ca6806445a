//! Per-participant first and last prescription dates

use std::sync::Arc;

use arrow::array::Array;
use arrow::datatypes::FieldRef;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RxCleanError};
use crate::schema::{self, ISSUE_DATE, PARTICIPANT_ID, days_to_date};
use crate::utils::arrow::{date_column, string_column};

/// First and last issue date of one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDateSummary {
    pub participant_id: String,
    pub min_issue_date: NaiveDate,
    pub max_issue_date: NaiveDate,
}

/// Mergeable per-participant min/max of issue dates
///
/// Dates are held as `Date32` day numbers. Partial accumulators built on
/// different batches can be merged in any order.
#[derive(Debug, Default, Clone)]
pub struct DateRangeAccumulator {
    ranges: FxHashMap<String, (i32, i32)>,
}

impl DateRangeAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator over a single normalized batch
    pub fn from_batch(batch: &RecordBatch) -> Result<Self> {
        let mut acc = Self::new();
        acc.update(batch)?;
        Ok(acc)
    }

    /// Fold a normalized batch into the accumulator
    ///
    /// Rows with a null participant or date are skipped; normalized input has
    /// none.
    pub fn update(&mut self, batch: &RecordBatch) -> Result<()> {
        let ids = string_column(batch, PARTICIPANT_ID)?;
        let dates = date_column(batch, ISSUE_DATE)?;

        for row in 0..batch.num_rows() {
            if ids.is_null(row) || dates.is_null(row) {
                continue;
            }
            self.observe_days(ids.value(row), dates.value(row));
        }
        Ok(())
    }

    fn observe_days(&mut self, participant_id: &str, days: i32) {
        match self.ranges.get_mut(participant_id) {
            Some((min, max)) => {
                *min = (*min).min(days);
                *max = (*max).max(days);
            }
            None => {
                self.ranges.insert(participant_id.to_string(), (days, days));
            }
        }
    }

    /// Record one issue date for a participant
    pub fn observe(&mut self, participant_id: &str, date: NaiveDate) {
        self.observe_days(participant_id, schema::date_to_days(date));
    }

    /// Combine with another partial result
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        let (mut large, small) = if self.ranges.len() >= other.ranges.len() {
            (std::mem::take(&mut self.ranges), other.ranges)
        } else {
            (other.ranges, std::mem::take(&mut self.ranges))
        };
        for (id, (lo, hi)) in small {
            large
                .entry(id)
                .and_modify(|(min, max)| {
                    *min = (*min).min(lo);
                    *max = (*max).max(hi);
                })
                .or_insert((lo, hi));
        }
        Self { ranges: large }
    }

    /// Number of participants seen
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Summaries sorted by participant id
    pub fn into_summaries(self) -> Result<Vec<ParticipantDateSummary>> {
        self.ranges
            .into_iter()
            .sorted_unstable_by(|a, b| a.0.cmp(&b.0))
            .map(|(participant_id, (min, max))| {
                let date = |days| {
                    days_to_date(days).ok_or_else(|| {
                        RxCleanError::schema(format!(
                            "Issue date out of range for participant {participant_id}"
                        ))
                    })
                };
                Ok(ParticipantDateSummary {
                    min_issue_date: date(min)?,
                    max_issue_date: date(max)?,
                    participant_id,
                })
            })
            .collect()
    }
}

/// Convert summaries to a record batch in the summary schema
pub fn summaries_to_record_batch(summaries: &[ParticipantDateSummary]) -> Result<RecordBatch> {
    let fields: Vec<FieldRef> = schema::summary_schema()
        .fields()
        .iter()
        .map(Arc::clone)
        .collect();

    serde_arrow::to_record_batch(&fields, &summaries)
        .map_err(|e| RxCleanError::schema(format!("Failed to build summary batch: {e}")))
}

/// Read summaries back from a summary-schema record batch
pub fn summaries_from_record_batch(batch: &RecordBatch) -> Result<Vec<ParticipantDateSummary>> {
    serde_arrow::from_record_batch(batch)
        .map_err(|e| RxCleanError::schema(format!("Failed to read summary batch: {e}")))
}
