//! Async Parquet batch reading operations

use std::path::Path;

use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;

use super::file_ops::open_parquet_file_async;
use crate::error::Result;
use crate::utils::io::create_projection;
use crate::utils::logging::{FileAction, log_file_complete, log_file_start};

/// Read a Parquet file asynchronously into Arrow record batches
///
/// # Arguments
/// * `path` - Path to the Parquet file
/// * `columns` - Optional column names to project; all must exist
/// * `batch_size` - Rows per record batch
pub async fn read_parquet_async(
    path: &Path,
    columns: Option<&[&str]>,
    batch_size: usize,
) -> Result<Vec<RecordBatch>> {
    let start = std::time::Instant::now();
    log_file_start(FileAction::Read, path);

    let file = open_parquet_file_async(path).await?;
    let mut builder = ParquetRecordBatchStreamBuilder::new(file).await?;

    if let Some(columns) = columns {
        let mask = create_projection(columns, builder.schema(), builder.parquet_schema())?;
        builder = builder.with_projection(mask);
    }

    let stream = builder.with_batch_size(batch_size).build()?;
    let batches = stream.try_collect::<Vec<_>>().await?;

    log_file_complete(FileAction::Read, path, batches.len(), "batches", Some(start.elapsed()));
    Ok(batches)
}
