//! Async operations for locating Parquet inputs

use std::path::{Path, PathBuf};

use tokio::fs::{self, File};

use crate::error::{Result, RxCleanError};
use crate::utils::logging::{FileAction, log_file_complete, log_file_start, log_warning};

/// Find all Parquet files in a directory asynchronously, sorted by name
pub async fn find_parquet_files_async(dir: &Path) -> Result<Vec<PathBuf>> {
    log_file_start(FileAction::Scan, dir);

    let mut parquet_files = Vec::<PathBuf>::new();
    let mut entries = fs::read_dir(dir).await.map_err(|e| RxCleanError::io(dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RxCleanError::io(dir, e))?
    {
        let path = entry.path();
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| RxCleanError::io(&path, e))?;

        if metadata.is_file() && path.extension().is_some_and(|ext| ext == "parquet") {
            parquet_files.push(path);
        }
    }
    parquet_files.sort();

    if parquet_files.is_empty() {
        log_warning("No Parquet files found in directory", Some(dir));
    } else {
        log_file_complete(FileAction::Scan, dir, parquet_files.len(), "Parquet files", None);
    }

    Ok(parquet_files)
}

/// Resolve a file or directory to the Parquet files it names
pub async fn resolve_input_files_async(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| RxCleanError::io(path, e))?;

    if metadata.is_dir() {
        find_parquet_files_async(path).await
    } else {
        Ok(vec![path.to_path_buf()])
    }
}

/// Open a Parquet file for reading
pub async fn open_parquet_file_async(path: &Path) -> Result<File> {
    File::open(path).await.map_err(|e| RxCleanError::io(path, e))
}
