//! Utilities for working with Arrow arrays.
//!
//! Column access with type coercion: text-like and numeric columns are cast to
//! `Utf8`, date columns are accepted as `Date32` or parsed from text.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Date32Array, StringArray};
use arrow::compute::kernels::cast::{can_cast_types, cast};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use crate::error::{Result, RxCleanError};
use crate::schema::{date_to_days, parse_issue_date};

/// Get a column from a record batch by name
pub fn get_column(batch: &RecordBatch, column_name: &str) -> Result<ArrayRef> {
    let idx = batch
        .schema()
        .index_of(column_name)
        .map_err(|_| RxCleanError::column_not_found(column_name))?;
    Ok(Arc::clone(batch.column(idx)))
}

/// Downcast a column to a specific array type with a clear error message
pub fn downcast_array<'a, A: Array + 'static>(
    array: &'a ArrayRef,
    column_name: &str,
    expected_type_name: &str,
) -> Result<&'a A> {
    array
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| RxCleanError::column_type(column_name, expected_type_name, array.data_type()))
}

/// Whether a column type may be read as text
///
/// Strings, integers and floats qualify; booleans, dates and nested types do
/// not, since their text form would never be a meaningful code or name.
#[must_use]
pub fn is_text_like(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View | DataType::Null
    ) || data_type.is_integer()
        || data_type.is_floating()
}

/// Read a column as a `Utf8` array, casting text-like types
pub fn string_column(batch: &RecordBatch, column_name: &str) -> Result<StringArray> {
    let array = get_column(batch, column_name)?;
    to_string_array(&array, column_name)
}

/// Cast a text-like array to `Utf8`
pub fn to_string_array(array: &ArrayRef, column_name: &str) -> Result<StringArray> {
    let data_type = array.data_type();
    if !is_text_like(data_type) || !can_cast_types(data_type, &DataType::Utf8) {
        return Err(RxCleanError::column_type(column_name, "text", data_type));
    }

    let converted = if data_type == &DataType::Utf8 {
        Arc::clone(array)
    } else {
        cast(array, &DataType::Utf8)?
    };
    Ok(downcast_array::<StringArray>(&converted, column_name, "Utf8")?.clone())
}

/// Read a date column as `Date32`
///
/// `Date32` columns are returned as they are. Text columns are parsed with
/// [`parse_issue_date`]; values that do not parse become null.
pub fn date_column(batch: &RecordBatch, column_name: &str) -> Result<Date32Array> {
    let array = get_column(batch, column_name)?;
    match array.data_type() {
        DataType::Date32 => Ok(downcast_array::<Date32Array>(&array, column_name, "Date32")?.clone()),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let text = to_string_array(&array, column_name)?;
            Ok(text
                .iter()
                .map(|value| value.and_then(parse_issue_date).map(date_to_days))
                .collect())
        }
        other => Err(RxCleanError::column_type(column_name, "Date32 or text date", other)),
    }
}
