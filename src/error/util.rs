//! Utility functions for error handling
//!
//! Path checks that turn a missing or unreadable input into an
//! [`RxCleanError::Io`] carrying the offending path and what it was needed for.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Result, RxCleanError};

fn not_available(path: &Path, kind: io::ErrorKind, message: String) -> RxCleanError {
    RxCleanError::io(path, io::Error::new(kind, message))
}

/// Check that a file exists and can be opened
///
/// # Arguments
/// * `path` - The path to the file
/// * `purpose` - Why the file is needed (for error context)
pub fn validate_file(path: &Path, purpose: &str) -> Result<()> {
    if !path.exists() {
        return Err(not_available(
            path,
            io::ErrorKind::NotFound,
            format!("File not found, needed for: {purpose}"),
        ));
    }

    if !path.is_file() {
        return Err(not_available(
            path,
            io::ErrorKind::InvalidInput,
            format!("Path is not a file, expected a file for: {purpose}"),
        ));
    }

    fs::File::open(path).map(|_| ()).map_err(|e| {
        let message = match e.kind() {
            io::ErrorKind::PermissionDenied => "Permission denied - check file permissions".into(),
            _ => format!("Failed to open file for {purpose}: {e}"),
        };
        not_available(path, e.kind(), message)
    })
}

/// Check if a directory exists and is readable
pub fn validate_directory(path: &Path, purpose: &str) -> Result<()> {
    if !path.exists() {
        return Err(not_available(
            path,
            io::ErrorKind::NotFound,
            format!("Directory not found, needed for: {purpose}"),
        ));
    }

    if !path.is_dir() {
        return Err(not_available(
            path,
            io::ErrorKind::InvalidInput,
            format!("Path is not a directory, expected a directory for: {purpose}"),
        ));
    }

    fs::read_dir(path).map(|_| ()).map_err(|e| {
        let message = match e.kind() {
            io::ErrorKind::PermissionDenied => {
                "Permission denied - check directory permissions".into()
            }
            _ => format!("Failed to access directory for {purpose}: {e}"),
        };
        not_available(path, e.kind(), message)
    })
}

/// Read a text file, reporting the path and purpose on failure
pub fn safe_read_to_string(path: &Path, purpose: &str) -> Result<String> {
    validate_file(path, purpose)?;

    fs::read_to_string(path).map_err(|e| {
        let message = match e.kind() {
            io::ErrorKind::InvalidData => "File contains invalid UTF-8 data".into(),
            _ => format!("Failed to read file content for {purpose}: {e}"),
        };
        not_available(path, e.kind(), message)
    })
}
