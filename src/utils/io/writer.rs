//! Atomic Parquet output and stable alias publication
//!
//! Output is written to a temporary file beside the destination and renamed
//! into place only after the writer has been closed and synced, so readers of
//! the final path never observe a partial file. If writing fails the
//! temporary file is removed when it is dropped.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tempfile::NamedTempFile;

use crate::error::{Result, RxCleanError};
use crate::utils::logging::{FileAction, log_file_complete, log_file_start};

fn destination_dir(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| RxCleanError::io(&parent, e))?;
    Ok(parent)
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

/// Write record batches to a Parquet file, publishing it atomically
///
/// All batches must share `schema`. An empty batch list still produces a
/// valid file containing only the schema.
pub fn write_parquet_atomic(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> Result<usize> {
    let start = Instant::now();
    log_file_start(FileAction::Write, path);

    let dir = destination_dir(path)?;
    let tmp = tempfile::Builder::new()
        .prefix(".rx-clean-")
        .suffix(".parquet.tmp")
        .tempfile_in(&dir)
        .map_err(|e| RxCleanError::io(&dir, e))?;

    let rows = write_batches(&tmp, schema, batches)?;

    tmp.persist(path)
        .map_err(|e| RxCleanError::io(path, e.error))?;

    log_file_complete(FileAction::Write, path, rows, "rows", Some(start.elapsed()));
    Ok(rows)
}

fn write_batches(tmp: &NamedTempFile, schema: SchemaRef, batches: &[RecordBatch]) -> Result<usize> {
    let file = tmp.reopen().map_err(|e| RxCleanError::io(tmp.path(), e))?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(writer_properties()))?;

    let mut rows = 0;
    for batch in batches {
        writer.write(batch)?;
        rows += batch.num_rows();
    }
    writer.close()?;

    tmp.as_file()
        .sync_all()
        .map_err(|e| RxCleanError::io(tmp.path(), e))?;
    make_world_readable(tmp)?;
    Ok(rows)
}

// Temporary files are created owner-only; published outputs are shared
#[cfg(unix)]
fn make_world_readable(tmp: &NamedTempFile) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tmp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(0o644))
        .map_err(|e| RxCleanError::io(tmp.path(), e))
}

#[cfg(not(unix))]
fn make_world_readable(_tmp: &NamedTempFile) -> Result<()> {
    Ok(())
}

/// Check that `alias` can be published over
///
/// The alias path may be absent or an existing symbolic link. Anything else
/// (a regular file or a directory) is refused so that data is never replaced
/// by a link.
pub fn check_alias_path(alias: &Path) -> Result<()> {
    match std::fs::symlink_metadata(alias) {
        Ok(meta) if !meta.file_type().is_symlink() => Err(RxCleanError::io(
            alias,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "alias path exists and is not a symbolic link",
            ),
        )),
        _ => Ok(()),
    }
}

/// Point a stable alias path at `target` with a symbolic link
///
/// The link is created under a unique temporary name beside the alias and
/// renamed over it, so the alias always resolves either to its previous
/// target or to the new one.
pub fn publish_alias(target: &Path, alias: &Path) -> Result<PathBuf> {
    let target = std::fs::canonicalize(target).map_err(|e| RxCleanError::io(target, e))?;
    check_alias_path(alias)?;

    let dir = destination_dir(alias)?;
    let file_name = alias
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "alias".to_string());

    // Unlinked again on drop if the rename below fails
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".link")
        .make_in(&dir, |link| make_symlink(&target, link))
        .map_err(|e| RxCleanError::io(&dir, e))?;

    staging
        .persist(alias)
        .map_err(|e| RxCleanError::io(alias, e.error))?;

    log::info!("Published {} -> {}", alias.display(), target.display());
    Ok(target)
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
