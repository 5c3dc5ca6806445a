//! Core filtering functionality for record batches
//!
//! Both the record normalizer and the drug matcher are row filters over Arrow
//! record batches that also report what they dropped. [`BatchFilter`] is the
//! common seam the pipeline drives them through.

use std::ops::AddAssign;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray};
use arrow::compute::filter as arrow_filter;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::{Result, RxCleanError};

/// Filter a set of columns by a boolean mask
///
/// Null mask entries are treated as false.
pub fn filter_arrays(columns: &[ArrayRef], mask: &BooleanArray) -> Result<Vec<ArrayRef>> {
    if let Some(col) = columns.iter().find(|c| c.len() != mask.len()) {
        return Err(RxCleanError::schema(format!(
            "Mask length ({}) doesn't match column length ({})",
            mask.len(),
            col.len()
        )));
    }

    Ok(columns
        .iter()
        .map(|col| arrow_filter(col.as_ref(), mask))
        .collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Filter a set of columns by a boolean mask and assemble them into a batch
pub fn filter_columns(
    schema: SchemaRef,
    columns: &[ArrayRef],
    mask: &BooleanArray,
) -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(schema, filter_arrays(columns, mask)?)?)
}

/// Filter a record batch based on a boolean mask
pub fn filter_record_batch(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    filter_columns(batch.schema(), batch.columns(), mask)
}

/// A row filter over record batches
pub trait BatchFilter: std::fmt::Debug + Send + Sync {
    /// Counters describing what a filter kept and dropped
    type Stats: Default + AddAssign + Send;

    /// Filter a record batch, returning the kept rows and the batch's counters
    fn filter(&self, batch: &RecordBatch) -> Result<(RecordBatch, Self::Stats)>;

    /// Schema of the batches this filter produces
    fn output_schema(&self) -> SchemaRef;
}

/// Drop batches left empty by filtering
#[must_use]
pub fn non_empty(batches: Vec<RecordBatch>) -> Vec<RecordBatch> {
    batches.into_iter().filter(|b| b.num_rows() > 0).collect()
}

/// Wrap an array as an [`ArrayRef`]
pub(crate) fn array_ref<A: arrow::array::Array + 'static>(array: A) -> ArrayRef {
    Arc::new(array)
}
