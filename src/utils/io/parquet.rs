//! Parquet file operations
//!
//! Projecting the required columns of a Parquet file and reading them into
//! Arrow record batches.

use std::fs::File;
use std::path::Path;

use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use parquet::arrow::{ProjectionMask, arrow_reader::ParquetRecordBatchReaderBuilder};
use parquet::schema::types::SchemaDescriptor;

use crate::error::{Result, RxCleanError};
use crate::utils::logging::{FileAction, log_file_complete, log_file_start};

/// Build a projection mask selecting the named columns
///
/// Every requested column must exist in the file; a missing column is a
/// schema error rather than a silently narrower read.
pub fn create_projection(
    columns: &[&str],
    file_schema: &Schema,
    parquet_schema: &SchemaDescriptor,
) -> Result<ProjectionMask> {
    let (found, missing): (Vec<_>, Vec<_>) = columns
        .iter()
        .map(|name| file_schema.index_of(name).map_err(|_| *name))
        .partition_result();

    if !missing.is_empty() {
        return Err(RxCleanError::schema(format!(
            "Missing required column(s): {}",
            missing.join(", ")
        )));
    }

    Ok(ProjectionMask::roots(parquet_schema, found))
}

/// Read a Parquet file into Arrow record batches
///
/// # Arguments
/// * `path` - Path to the Parquet file
/// * `columns` - Optional column names to project
/// * `batch_size` - Rows per record batch
pub fn read_parquet(
    path: &Path,
    columns: Option<&[&str]>,
    batch_size: usize,
) -> Result<Vec<RecordBatch>> {
    let start = std::time::Instant::now();
    log_file_start(FileAction::Read, path);

    let file = File::open(path).map_err(|e| RxCleanError::io(path, e))?;
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    if let Some(columns) = columns {
        let mask = create_projection(columns, builder.schema(), builder.parquet_schema())?;
        builder = builder.with_projection(mask);
    }

    let reader = builder.with_batch_size(batch_size).build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    log_file_complete(FileAction::Read, path, batches.len(), "batches", Some(start.elapsed()));
    Ok(batches)
}
