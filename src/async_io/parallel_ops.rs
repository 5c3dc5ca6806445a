//! Concurrent loading of Parquet inputs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use futures::stream::{self, StreamExt, TryStreamExt};
use itertools::Itertools;

use super::batch_ops::read_parquet_async;
use super::file_ops::resolve_input_files_async;
use crate::error::{Result, Stage};

/// A record batch together with the file it was read from
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub path: Arc<PathBuf>,
    pub batch: RecordBatch,
}

/// Load a Parquet file or directory of files concurrently
///
/// Up to `num_cpus` files are read at once. Batches keep file order. The
/// first failure aborts the load and is annotated with `stage` and the
/// failing file.
pub async fn load_parquet_files_parallel_async(
    path: &Path,
    columns: &[&str],
    batch_size: usize,
    stage: Stage,
) -> Result<Vec<SourceBatch>> {
    log::info!("Loading Parquet input asynchronously: {}", path.display());

    let files = resolve_input_files_async(path)
        .await
        .map_err(|e| e.in_stage(stage, path))?;

    let per_file: Vec<Vec<SourceBatch>> = stream::iter(files.iter().cloned())
        .map(|file| async move {
            let batches = read_parquet_async(&file, Some(columns), batch_size)
                .await
                .map_err(|e| e.in_stage(stage, &file))?;
            let file = Arc::new(file);
            Ok::<_, crate::error::RxCleanError>(
                batches
                    .into_iter()
                    .map(|batch| SourceBatch {
                        path: Arc::clone(&file),
                        batch,
                    })
                    .collect_vec(),
            )
        })
        .buffered(num_cpus::get())
        .try_collect()
        .await?;

    let batches = per_file.into_iter().flatten().collect_vec();
    log::info!(
        "Successfully loaded {} batches from {} Parquet files",
        batches.len(),
        files.len()
    );
    Ok(batches)
}
