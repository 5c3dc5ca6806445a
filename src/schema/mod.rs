//! Arrow schemas for the prescription, demographic and summary record batches.

pub mod date_utils;

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::{Result, RxCleanError};

pub use date_utils::{date_to_days, days_to_date, parse_issue_date};

pub const PARTICIPANT_ID: &str = "participant_id";
pub const READ_2: &str = "read_2";
pub const BNF_CODE: &str = "bnf_code";
pub const DMD_CODE: &str = "dmd_code";
pub const DRUG_NAME: &str = "drug_name";
pub const QUANTITY: &str = "quantity";
pub const ISSUE_DATE: &str = "issue_date";
pub const BNF_CODE_CLEAN: &str = "bnf_code_clean";
pub const GENERIC_NAME: &str = "generic_name";
pub const BRAND_NAME: &str = "brand_name";
pub const MIN_ISSUE_DATE: &str = "min_issue_date";
pub const MAX_ISSUE_DATE: &str = "max_issue_date";

/// Text columns of a prescription record, in schema order
pub const TEXT_COLUMNS: [&str; 5] = [READ_2, BNF_CODE, DMD_CODE, DRUG_NAME, QUANTITY];

/// Schema of the normalized prescription stream
///
/// Every row has a participant and a resolved, non-sentinel issue date.
#[must_use]
pub fn normalized_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(PARTICIPANT_ID, DataType::Utf8, false),
        Field::new(READ_2, DataType::Utf8, true),
        Field::new(BNF_CODE, DataType::Utf8, true),
        Field::new(DMD_CODE, DataType::Utf8, true),
        Field::new(DRUG_NAME, DataType::Utf8, true),
        Field::new(QUANTITY, DataType::Utf8, true),
        Field::new(ISSUE_DATE, DataType::Date32, false),
    ]))
}

/// Schema of the drug-of-interest output
///
/// Normalized fields followed by the cleaned code and the standardised
/// generic and brand names.
#[must_use]
pub fn matched_schema() -> SchemaRef {
    let mut fields: Vec<Field> = normalized_schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields.push(Field::new(BNF_CODE_CLEAN, DataType::Utf8, true));
    fields.push(Field::new(GENERIC_NAME, DataType::Utf8, true));
    fields.push(Field::new(BRAND_NAME, DataType::Utf8, true));
    Arc::new(Schema::new(fields))
}

/// Schema of the per-participant first/last prescription summary
#[must_use]
pub fn summary_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(PARTICIPANT_ID, DataType::Utf8, false),
        Field::new(MIN_ISSUE_DATE, DataType::Date32, false),
        Field::new(MAX_ISSUE_DATE, DataType::Date32, false),
    ]))
}

/// Check that every named column is present in a batch
pub fn require_columns(batch: &RecordBatch, columns: &[&str]) -> Result<()> {
    let schema = batch.schema();
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|name| schema.index_of(name).is_err())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(RxCleanError::schema(format!(
            "Missing required column(s): {}",
            missing.join(", ")
        )))
    }
}
